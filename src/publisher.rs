//! Publishing seam and the post body template.

use crate::config::TopicRule;
use crate::errors::PublishError;
use crate::models::{Candidate, PostReceipt};
use chrono::NaiveDate;

/// Trait for platforms that can publish a selected article.
///
/// `Ok` means the platform confirmed the post exists. Anything short of
/// that is an `Err`, and the caller must not record the link.
pub trait Publisher {
    async fn publish(
        &self,
        candidate: &Candidate,
        topic: &TopicRule,
    ) -> Result<PostReceipt, PublishError>;
}

/// Render the post body for `candidate`.
///
/// ```text
/// 🔐 Cybersecurity Update | 06 May 2025
///
/// 📰 <title>
///
/// <summary>
///
/// 🔗 Read more: <link>
///
/// #CyberSecurity #InfoSec
/// ```
///
/// An empty summary drops its paragraph rather than leaving a blank gap.
pub fn compose_post_text(topic: &TopicRule, candidate: &Candidate, date: NaiveDate) -> String {
    let mut parts = vec![
        format!("{} {} | {}", topic.emoji, topic.title, date.format("%d %b %Y")),
        format!("📰 {}", candidate.title),
    ];
    if !candidate.summary.is_empty() {
        parts.push(candidate.summary.clone());
    }
    parts.push(format!("🔗 Read more: {}", candidate.link));
    if !topic.hashtags.trim().is_empty() {
        parts.push(topic.hashtags.trim().to_string());
    }
    parts.join("\n\n")
}
