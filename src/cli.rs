//! Command-line interface definitions.
//!
//! Every option can be given as a flag or through an environment variable,
//! so the bot runs unchanged from a cron job, a container or a CI workflow.

use crate::errors::ConfigError;
use crate::news::{MAX_LOOKBACK_DAYS, MAX_PAGE_SIZE};
use clap::Parser;

/// Command-line arguments for the news poster.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, built-in topics, state in ./state
/// news_poster --state-dir ./state
///
/// # Custom topic table, selection only
/// news_poster --topics topics.yaml --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// LinkedIn OAuth access token
    #[arg(long, env = "LINKEDIN_ACCESS_TOKEN", hide_env_values = true)]
    pub linkedin_access_token: Option<String>,

    /// Author URN posts are published as (e.g. urn:li:person:abc123)
    #[arg(long, env = "PERSON_URN")]
    pub person_urn: Option<String>,

    /// News search API key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// Optional YAML topic table; the built-in table is used when absent
    #[arg(short, long, env = "TOPICS_FILE")]
    pub topics: Option<String>,

    /// Directory holding seen-sets and the rotation cursor
    #[arg(short, long, env = "STATE_DIR", default_value = ".")]
    pub state_dir: String,

    /// How many days back to search (1-365)
    #[arg(
        long,
        env = "LOOKBACK_DAYS",
        default_value_t = 7,
        value_parser = clap::value_parser!(i64).range(1..=MAX_LOOKBACK_DAYS)
    )]
    pub lookback_days: i64,

    /// Articles requested per search (1-100)
    #[arg(
        long,
        env = "PAGE_SIZE",
        default_value_t = 50,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_PAGE_SIZE))
    )]
    pub page_size: u32,

    /// Article language
    #[arg(long, env = "NEWS_LANGUAGE", default_value = "en")]
    pub language: String,

    /// Timeout in seconds applied to every HTTP request
    #[arg(
        long,
        env = "HTTP_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// News search API base URL
    #[arg(long, env = "NEWS_API_URL", default_value = crate::news::DEFAULT_NEWS_API_URL)]
    pub news_api_url: String,

    /// LinkedIn API base URL
    #[arg(
        long,
        env = "LINKEDIN_API_URL",
        default_value = crate::linkedin::DEFAULT_LINKEDIN_API_URL
    )]
    pub linkedin_api_url: String,

    /// Select an article and log the post, without publishing or saving state
    #[arg(long)]
    pub dry_run: bool,
}

/// Credentials needed for a run.
///
/// The LinkedIn pair is `None` only in dry-run mode.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub news_api_key: String,
    pub linkedin: Option<LinkedInCredentials>,
}

#[derive(Debug, Clone)]
pub struct LinkedInCredentials {
    pub access_token: String,
    pub person_urn: String,
}

fn required(value: &Option<String>, var: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingCredential { var })
}

impl Cli {
    /// Resolve the credentials this run needs.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingCredential`] naming the first missing variable.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let news_api_key = required(&self.news_api_key, "NEWS_API_KEY")?;
        let linkedin = if self.dry_run {
            None
        } else {
            Some(LinkedInCredentials {
                access_token: required(&self.linkedin_access_token, "LINKEDIN_ACCESS_TOKEN")?,
                person_urn: required(&self.person_urn, "PERSON_URN")?,
            })
        };
        Ok(Credentials {
            news_api_key,
            linkedin,
        })
    }
}
