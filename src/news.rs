//! News search client with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`NewsSource`]: core trait for "search recent articles"
//! - [`NewsApiClient`]: implementation against the `everything` endpoint
//! - [`RetrySearch`]: decorator that adds retry logic to any `NewsSource`
//!
//! # Retry Strategy
//!
//! - Maximum 3 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to every delay

use crate::config::TopicRule;
use crate::errors::NewsError;
use crate::models::{NewsApiResponse, NewsArticle};
use crate::utils::truncate_for_log;
use chrono::{Duration, NaiveDate, Utc};
use itertools::Itertools;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Public news search endpoint.
pub const DEFAULT_NEWS_API_URL: &str = "https://newsapi.org";

/// Longest search window, in days.
pub const MAX_LOOKBACK_DAYS: i64 = 365;

/// Largest page the `everything` endpoint serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Parameters for one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub domains: Vec<String>,
    pub query: String,
    pub language: String,
    pub page_size: u32,
    /// Oldest publish date to include.
    pub from: NaiveDate,
}

impl NewsQuery {
    /// Build the search for `topic` covering the last `lookback_days` days.
    ///
    /// Both numbers are clamped into the range the API accepts
    /// (`1..=MAX_LOOKBACK_DAYS`, `1..=MAX_PAGE_SIZE`).
    pub fn for_topic(
        topic: &TopicRule,
        language: &str,
        page_size: u32,
        lookback_days: i64,
    ) -> Self {
        let lookback = Duration::days(lookback_days.clamp(1, MAX_LOOKBACK_DAYS));
        Self {
            domains: topic.domains.clone(),
            query: topic.query.clone(),
            language: language.to_string(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            from: (Utc::now() - lookback).date_naive(),
        }
    }
}

/// Trait for async news search.
///
/// Implementors return articles in the order the source ranks them
/// (newest first). An empty list is a valid answer, not an error.
pub trait NewsSource {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsArticle>, NewsError>;
}

/// Client for the news API `everything` endpoint.
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl NewsApiClient {
    pub fn new(http: reqwest::Client, base_url: Url, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path("/v2/everything");
        url
    }
}

impl NewsSource for NewsApiClient {
    #[instrument(level = "info", skip_all, fields(query = %query.query))]
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsArticle>, NewsError> {
        let t0 = Instant::now();
        let page_size = query.page_size.to_string();
        let from = query.from.format("%Y-%m-%d").to_string();
        let domains = query.domains.iter().map(|d| d.trim()).join(",");

        let resp = self
            .http
            .get(self.endpoint())
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("domains", domains.as_str()),
                ("q", query.query.as_str()),
                ("language", query.language.as_str()),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("from", from.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        let dt = t0.elapsed();

        // Error bodies carry a JSON explanation; prefer it over the bare status.
        let parsed = serde_json::from_str::<NewsApiResponse>(&body);
        if let Ok(ref r) = parsed {
            if r.status.as_deref() == Some("error") {
                return Err(NewsError::Api {
                    code: r.code.clone().unwrap_or_else(|| status.as_u16().to_string()),
                    message: r.message.clone().unwrap_or_default(),
                });
            }
        }
        if !status.is_success() {
            return Err(NewsError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let articles = match parsed {
            Ok(r) => {
                debug!(total_results = ?r.total_results, "News search matched");
                r.articles.unwrap_or_default()
            }
            Err(e) => {
                warn!(
                    error = %e,
                    body_preview = %truncate_for_log(&body, 300),
                    "Unparseable news response; treating as no results"
                );
                Vec::new()
            }
        };

        info!(
            count = articles.len(),
            elapsed_ms = dt.as_millis() as u64,
            "News search returned"
        );
        Ok(articles)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`NewsSource`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// Errors that will not go away on retry (a rejected API key, a bad
/// request) are returned immediately.
pub struct RetrySearch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetrySearch<T>
where
    T: NewsSource,
{
    /// Wrap `inner` with up to `max_retries` retries starting at `base_delay`.
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetrySearch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySearch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

/// Whether a failed search is worth retrying.
fn is_transient(e: &NewsError) -> bool {
    match e {
        NewsError::Http(_) => true,
        NewsError::Status { status, .. } => *status == 429 || *status >= 500,
        NewsError::Api { code, .. } => code == "rateLimited" || code == "unexpectedError",
    }
}

impl<T> NewsSource for RetrySearch<T>
where
    T: NewsSource,
{
    #[instrument(level = "info", skip_all)]
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsArticle>, NewsError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.search(query).await {
                Ok(articles) => return Ok(articles),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !is_transient(&e) {
                        debug!(error = %e, "search() failed with a permanent error");
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "search() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "search() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
