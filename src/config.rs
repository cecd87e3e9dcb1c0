//! Topic rules and keyword lanes.
//!
//! The whole table is built once at startup, either from the built-in
//! defaults or from a YAML file, validated, and then passed by reference to
//! the selector and the orchestrator. Nothing mutates it afterwards.
//!
//! # YAML layout
//!
//! ```yaml
//! lanes:
//!   threat: [breach, ransomware]
//!   advancement: [framework, zero trust]
//!   exclude: [arrest, court]
//! topics:
//!   - name: cybersecurity
//!     domains: [thehackernews.com, bleepingcomputer.com]
//!     query: "cybersecurity OR ransomware"
//!     exclude: [sponsored]
//!     emoji: "🔐"
//!     title: Cybersecurity Update
//!     hashtags: "#CyberSecurity #InfoSec"
//! ```

use crate::errors::ConfigError;
use crate::utils::slugify;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument};

/// One content lane: where to search, what to search for, and how to present it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopicRule {
    /// Unique name; its slug names the per-topic seen-set file.
    pub name: String,
    /// Source domains the search is restricted to.
    pub domains: Vec<String>,
    /// Boolean search query passed to the news API.
    pub query: String,
    /// At least one of these must appear. Empty means "use the fallback lanes".
    #[serde(default)]
    pub required: Vec<String>,
    /// Topic-specific exclusions, applied on top of the global list.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Emoji leading the post header.
    pub emoji: String,
    /// Header title, also used as the media title.
    pub title: String,
    /// Hashtag line closing the post.
    pub hashtags: String,
}

impl TopicRule {
    /// File-name-safe form of the topic name.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Keyword lists shared by every topic.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeywordLanes {
    /// Incident-style terms; one of the two fallback lanes.
    pub threat: Vec<String>,
    /// Practice/technology terms; the other fallback lane.
    pub advancement: Vec<String>,
    /// Global exclusions, applied to every topic.
    pub exclude: Vec<String>,
}

/// The complete, immutable rule table for a run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub lanes: KeywordLanes,
    pub topics: Vec<TopicRule>,
}

impl BotConfig {
    /// Parse and validate a YAML rule table.
    pub fn from_yaml(yaml: &str, path: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the rule table from `path`, or fall back to the built-in table.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let config = Self::default();
            info!(topics = config.topics.len(), "Using built-in topic table");
            return Ok(config);
        };

        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
        let config = Self::from_yaml(&yaml, path)?;
        info!(topics = config.topics.len(), "Loaded topic table");
        Ok(config)
    }

    /// Check the invariants the rest of the bot relies on.
    ///
    /// # Errors
    ///
    /// - no topics at all
    /// - a topic whose name slugifies to nothing, or collides with another
    /// - a topic without domains or without a query
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topics.is_empty() {
            return Err(invalid("at least one topic is required"));
        }

        let mut slugs = HashSet::new();
        for topic in &self.topics {
            let slug = topic.slug();
            if slug.is_empty() {
                return Err(invalid(format!("topic name {:?} is empty", topic.name)));
            }
            if !slugs.insert(slug) {
                return Err(invalid(format!("duplicate topic name {:?}", topic.name)));
            }
            if topic.domains.iter().all(|d| d.trim().is_empty()) {
                return Err(invalid(format!("topic {:?} has no domains", topic.name)));
            }
            if topic.query.trim().is_empty() {
                return Err(invalid(format!("topic {:?} has no query", topic.name)));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for BotConfig {
    fn default() -> Self {
        let lanes = KeywordLanes {
            threat: strings(&[
                "breach",
                "attack",
                "exploited",
                "vulnerability",
                "zero-day",
                "malware",
                "ransomware",
                "phishing",
            ]),
            advancement: strings(&[
                "framework",
                "architecture",
                "zero trust",
                "cloud",
                "ai",
                "automation",
                "platform",
                "devsecops",
                "mitigation",
                "best practice",
                "strategy",
                "compliance",
                "standard",
                "guideline",
            ]),
            exclude: strings(&[
                "arrest",
                "interpol",
                "europol",
                "sentenced",
                "trial",
                "court",
                "gang",
                "police",
            ]),
        };

        let topics = vec![
            TopicRule {
                name: "cybersecurity".to_string(),
                domains: strings(&[
                    "thehackernews.com",
                    "bleepingcomputer.com",
                    "zdnet.com",
                    "darkreading.com",
                    "securityweek.com",
                    "threatpost.com",
                    "csis.org",
                    "nist.gov",
                    "cloudflare.com",
                    "wired.com",
                    "arstechnica.com",
                    "techcrunch.com",
                    "venturebeat.com",
                    "infosecurity-magazine.com",
                    "cisa.gov",
                    "mitre.org",
                    "sans.org",
                ]),
                query: "cybersecurity OR security OR cyber attack OR breach OR \
                        ransomware OR vulnerability OR zero-day OR malware OR \
                        cloud security OR AI security OR DevSecOps OR \
                        zero trust OR framework OR compliance OR mitigation"
                    .to_string(),
                required: Vec::new(),
                exclude: Vec::new(),
                emoji: "🔐".to_string(),
                title: "Cybersecurity Update".to_string(),
                hashtags: "#CyberSecurity #InfoSec #CloudSecurity #DevSecOps".to_string(),
            },
            TopicRule {
                name: "cloud".to_string(),
                domains: strings(&[
                    "infoq.com",
                    "thenewstack.io",
                    "zdnet.com",
                    "techcrunch.com",
                    "venturebeat.com",
                    "arstechnica.com",
                    "theregister.com",
                ]),
                query: "cloud OR kubernetes OR serverless OR AWS OR Azure OR \"Google Cloud\""
                    .to_string(),
                required: strings(&[
                    "cloud",
                    "kubernetes",
                    "serverless",
                    "aws",
                    "azure",
                    "google cloud",
                    "multi-cloud",
                ]),
                exclude: strings(&["earnings", "stock", "shares"]),
                emoji: "☁️".to_string(),
                title: "Cloud Update".to_string(),
                hashtags: "#Cloud #CloudComputing #Kubernetes #DevOps".to_string(),
            },
            TopicRule {
                name: "ai".to_string(),
                domains: strings(&[
                    "venturebeat.com",
                    "techcrunch.com",
                    "wired.com",
                    "arstechnica.com",
                    "technologyreview.com",
                    "theverge.com",
                ]),
                query: "\"artificial intelligence\" OR \"machine learning\" OR LLM OR \
                        \"generative AI\" OR \"AI model\""
                    .to_string(),
                required: strings(&[
                    "artificial intelligence",
                    "machine learning",
                    "llm",
                    "generative ai",
                    "ai model",
                    "neural",
                ]),
                exclude: strings(&["celebrity", "lawsuit"]),
                emoji: "🤖".to_string(),
                title: "AI Update".to_string(),
                hashtags: "#AI #MachineLearning #GenerativeAI #LLM".to_string(),
            },
            TopicRule {
                name: "data".to_string(),
                domains: strings(&[
                    "infoq.com",
                    "thenewstack.io",
                    "zdnet.com",
                    "venturebeat.com",
                    "datanami.com",
                ]),
                query: "\"data engineering\" OR \"data platform\" OR \"data privacy\" OR \
                        analytics OR \"data governance\""
                    .to_string(),
                required: strings(&[
                    "data engineering",
                    "data platform",
                    "data privacy",
                    "analytics",
                    "data governance",
                    "database",
                ]),
                exclude: strings(&["earnings", "stock"]),
                emoji: "📊".to_string(),
                title: "Data Update".to_string(),
                hashtags: "#Data #DataEngineering #Analytics #DataPrivacy".to_string(),
            },
        ];

        Self { lanes, topics }
    }
}
