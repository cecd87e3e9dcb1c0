//! Error types for each concern of a run.
//!
//! Only [`ConfigError`] and [`StateError`] are fatal. News and publish
//! failures are logged by the orchestrator and the next topic is tried.

use thiserror::Error;

/// Startup configuration problems. Always fatal, raised before any topic is tried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required credential: set {var}")]
    MissingCredential { var: &'static str },

    #[error("failed to read topic file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse topic file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid topic configuration: {message}")]
    Invalid { message: String },
}

/// Failures talking to the news search API.
#[derive(Error, Debug)]
pub enum NewsError {
    #[error("news request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("news API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("news API error {code}: {message}")]
    Api { code: String, message: String },
}

/// Failures in the image upload / post creation flow.
///
/// Each variant carries enough of the platform's response to diagnose the
/// failure from the logs alone.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("register upload rejected with HTTP {status}: {body}")]
    RegisterUpload { status: u16, body: String },

    #[error("register upload response missing {field}")]
    MalformedRegisterResponse { field: &'static str },

    #[error("image download from {url} failed with HTTP {status}")]
    ImageFetch { url: String, status: u16 },

    #[error("image upload rejected with HTTP {status}: {body}")]
    ImageUpload { status: u16, body: String },

    #[error("post creation rejected with HTTP {status}: {body}")]
    PostCreate { status: u16, body: String },

    #[error("post creation returned HTTP {status} without a post id")]
    MissingConfirmation { status: u16 },

    #[error("publish request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure to save dedup or rotation state after a confirmed publish.
///
/// The post exists on the platform but will not be remembered, so the
/// same link can be posted again by a later run.
#[derive(Error, Debug)]
#[error("post {post_id} for {link} was published but state was not saved: {source}")]
pub struct StateError {
    pub link: String,
    pub post_id: String,
    #[source]
    pub source: std::io::Error,
}
