//! One selection-and-post cycle.
//!
//! ```text
//! Init ─▶ TryTopic(i) ─▶ no article ─────────────▶ TryTopic(i+1) ─▶ … ─▶ Exhausted
//!              │
//!              └▶ Selected ─▶ Publishing ─▶ failed ─▶ TryTopic(i+1)
//!                                   └──────▶ confirmed ─▶ record + persist ─▶ Done
//! ```
//!
//! State is loaded once at the start and written only after a confirmed
//! publish: the link goes into the topic and global seen-sets and the
//! rotation cursor moves past the successful topic. Every other path
//! leaves the state directory untouched.

use crate::config::BotConfig;
use crate::errors::StateError;
use crate::news::NewsSource;
use crate::publisher::{Publisher, compose_post_text};
use crate::selector::{SearchSettings, SeenScopes, select};
use crate::store::{Scope, StateStore};
use chrono::Local;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A post was confirmed and recorded.
    Posted {
        topic: String,
        link: String,
        post_id: String,
    },
    /// A candidate was found but not published (dry run).
    DryRun { topic: String, link: String },
    /// Every topic was tried without a confirmed post.
    Exhausted,
}

/// Drive one cycle over every topic, starting at the rotation cursor.
///
/// Without a `publisher` the run is a dry run: the first candidate is
/// rendered and logged, and nothing is published or written.
///
/// # Errors
///
/// Only a failure to save state after a confirmed publish is an error.
/// News and publish failures are logged and the next topic is tried.
#[instrument(
    level = "info",
    skip_all,
    fields(state_dir = %store.dir().display(), dry_run = publisher.is_none())
)]
pub async fn run_cycle<S, P>(
    config: &BotConfig,
    source: &S,
    publisher: Option<&P>,
    store: &StateStore,
    settings: &SearchSettings,
) -> Result<RunOutcome, StateError>
where
    S: NewsSource,
    P: Publisher,
{
    let t0 = Instant::now();
    let mut cursor = store.load_cursor(config.topics.len()).await;
    let mut global_seen = store.load_seen(&Scope::Global).await;
    info!(
        start_index = cursor.index(),
        topics = config.topics.len(),
        global_seen = global_seen.len(),
        "Starting run"
    );

    for index in cursor.attempt_order().collect::<Vec<_>>() {
        let topic = &config.topics[index];
        let topic_scope = Scope::Topic(topic.name.clone());
        let mut topic_seen = store.load_seen(&topic_scope).await;

        let seen = SeenScopes {
            topic: &topic_seen,
            global: &global_seen,
        };
        let candidate = match select(source, topic, &config.lanes, settings, seen).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                info!(topic = %topic.name, "No new article for topic; trying next");
                continue;
            }
            Err(e) => {
                warn!(topic = %topic.name, error = %e, "News search failed; trying next topic");
                continue;
            }
        };

        let Some(publisher) = publisher else {
            let text = compose_post_text(topic, &candidate, Local::now().date_naive());
            info!(topic = %topic.name, link = %candidate.link, %text, "Dry run: would publish");
            return Ok(RunOutcome::DryRun {
                topic: topic.name.clone(),
                link: candidate.link,
            });
        };

        let receipt = match publisher.publish(&candidate, topic).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    topic = %topic.name,
                    link = %candidate.link,
                    error = %e,
                    "Publish failed; trying next topic"
                );
                continue;
            }
        };

        // Confirmed: record everywhere, then persist.
        topic_seen.insert(&candidate.link);
        global_seen.insert(&candidate.link);
        cursor.advance(index);

        let mut first_failure = None;
        for (scope, set) in [(&topic_scope, &topic_seen), (&Scope::Global, &global_seen)] {
            if let Err(e) = store.persist_seen(scope, set).await {
                error!(
                    ?scope,
                    link = %candidate.link,
                    post_id = %receipt.post_id,
                    error = %e,
                    "Failed to save seen-set after publishing; this link may be posted again"
                );
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        if let Err(e) = store.persist_cursor(&cursor).await {
            error!(
                next_index = cursor.index(),
                post_id = %receipt.post_id,
                error = %e,
                "Failed to save rotation cursor after publishing"
            );
            if first_failure.is_none() {
                first_failure = Some(e);
            }
        }
        if let Some(cause) = first_failure {
            return Err(StateError {
                link: candidate.link,
                post_id: receipt.post_id,
                source: cause,
            });
        }

        info!(
            topic = %topic.name,
            link = %candidate.link,
            post_id = %receipt.post_id,
            next_index = cursor.index(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Posted successfully"
        );
        return Ok(RunOutcome::Posted {
            topic: topic.name.clone(),
            link: candidate.link,
            post_id: receipt.post_id,
        });
    }

    info!(
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "All topics exhausted; nothing posted"
    );
    Ok(RunOutcome::Exhausted)
}
