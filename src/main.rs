//! # News Poster
//!
//! Picks one fresh, on-topic news article per invocation and publishes it,
//! with its image, to a LinkedIn profile.
//!
//! ## Usage
//!
//! ```sh
//! LINKEDIN_ACCESS_TOKEN=... PERSON_URN=urn:li:person:... NEWS_API_KEY=... \
//!     news_poster --state-dir /var/lib/news_poster
//! ```
//!
//! ## Architecture
//!
//! One run is one cycle:
//! 1. **Load**: topic table, rotation cursor and seen-sets
//! 2. **Select**: search the news API for the topic under the cursor and
//!    keep the first unseen article that passes the keyword filters
//! 3. **Publish**: upload the image, create the post, require a post id back
//! 4. **Record**: add the link to the topic and global seen-sets and move
//!    the cursor past the topic, then exit
//!
//! Topics without a usable article, or whose publish fails, hand over to
//! the next topic. A run that finds nothing leaves every state file as it was.
//!
//! Runs must not overlap: the state directory is not locked.

use clap::Parser;
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cli;
mod config;
mod errors;
mod linkedin;
mod models;
mod news;
mod orchestrator;
mod publisher;
mod selector;
mod store;
mod utils;

use cli::Cli;
use config::BotConfig;
use errors::ConfigError;
use linkedin::LinkedInClient;
use news::{NewsApiClient, RetrySearch};
use orchestrator::{RunOutcome, run_cycle};
use selector::SearchSettings;
use store::StateStore;
use utils::ensure_writable_dir;

fn parse_url(value: &str, flag: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        message: format!("{flag} {value:?} is not a valid URL: {e}"),
    })
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "news_poster starting up");

    let args = Cli::parse();
    debug!(
        state_dir = %args.state_dir,
        topics = ?args.topics,
        dry_run = args.dry_run,
        "Parsed CLI arguments"
    );

    // --- Configuration: everything fatal happens before any topic is tried ---
    let credentials = args.credentials().inspect_err(|e| {
        error!(error = %e, "Missing configuration");
    })?;
    let bot_config = BotConfig::load(args.topics.as_deref()).await?;
    let news_url = parse_url(&args.news_api_url, "--news-api-url")?;
    let linkedin_url = parse_url(&args.linkedin_api_url, "--linkedin-api-url")?;

    if !args.dry_run {
        if let Err(e) = ensure_writable_dir(&args.state_dir).await {
            error!(
                path = %args.state_dir,
                error = %e,
                "State directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let http = reqwest::Client::builder()
        .timeout(StdDuration::from_secs(args.timeout_secs))
        .connect_timeout(StdDuration::from_secs(args.timeout_secs.min(10)))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let source = RetrySearch::new(
        NewsApiClient::new(http.clone(), news_url, credentials.news_api_key),
        3,
        StdDuration::from_secs(1),
    );
    let store = StateStore::new(&args.state_dir);
    let settings = SearchSettings {
        language: args.language.clone(),
        page_size: args.page_size,
        lookback_days: args.lookback_days,
    };
    // No LinkedIn credentials means --dry-run: select and log, never publish.
    let publisher = credentials
        .linkedin
        .map(|li| LinkedInClient::new(http, linkedin_url, li.access_token, li.person_urn));

    let outcome = run_cycle(&bot_config, &source, publisher.as_ref(), &store, &settings).await;

    let elapsed = start_time.elapsed();
    match outcome {
        Ok(RunOutcome::Posted {
            topic,
            link,
            post_id,
        }) => {
            info!(%topic, %link, %post_id, secs = elapsed.as_secs(), "Posted successfully");
        }
        Ok(RunOutcome::DryRun { topic, link }) => {
            info!(%topic, %link, secs = elapsed.as_secs(), "Dry run complete");
        }
        Ok(RunOutcome::Exhausted) => {
            info!(secs = elapsed.as_secs(), "No new article found");
        }
        Err(e) => {
            error!(
                error = %e,
                "Post published but not recorded; add the link to the seen-sets by hand"
            );
            return Err(e.into());
        }
    }

    Ok(())
}
