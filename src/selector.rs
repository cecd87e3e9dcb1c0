//! Article selection: pick the first fresh, on-topic article for a topic.
//!
//! An article qualifies when, in this order of checks:
//! 1. it has a link and an image
//! 2. the link is in neither the topic's nor the global seen-set
//! 3. its lowercased title + description contains no excluded keyword
//!    (global list plus the topic's own)
//! 4. it contains a required keyword, or, for topics without a required
//!    list, a keyword from the threat or advancement lane
//!
//! Keywords match as plain substrings of the lowercased text.

use crate::config::{KeywordLanes, TopicRule};
use crate::errors::NewsError;
use crate::models::{Candidate, NewsArticle};
use crate::news::{NewsQuery, NewsSource};
use crate::store::SeenSet;
use crate::utils::clean_summary;
use tracing::{debug, info, instrument};

/// Seen-sets that apply to one topic.
#[derive(Debug, Clone, Copy)]
pub struct SeenScopes<'a> {
    pub topic: &'a SeenSet,
    pub global: &'a SeenSet,
}

impl SeenScopes<'_> {
    pub fn contains(&self, link: &str) -> bool {
        self.topic.contains(link) || self.global.contains(link)
    }
}

/// Search parameters shared by every topic of a run.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub language: String,
    pub page_size: u32,
    pub lookback_days: i64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            page_size: 50,
            lookback_days: 7,
        }
    }
}

/// Why an article was passed over. Only used for debug logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingLink,
    MissingImage,
    AlreadyPosted,
    Excluded,
    OffTopic,
}

fn contains_any(text: &str, terms: &[String]) -> bool {
    terms.iter().any(|t| {
        let t = t.trim();
        !t.is_empty() && text.contains(&t.to_lowercase())
    })
}

fn check(
    article: &NewsArticle,
    topic: &TopicRule,
    lanes: &KeywordLanes,
    seen: SeenScopes<'_>,
) -> Result<(), Rejection> {
    let link = article.url.as_deref().unwrap_or_default();
    if link.trim().is_empty() {
        return Err(Rejection::MissingLink);
    }
    if article
        .url_to_image
        .as_deref()
        .unwrap_or_default()
        .trim()
        .is_empty()
    {
        return Err(Rejection::MissingImage);
    }
    if seen.contains(link) {
        return Err(Rejection::AlreadyPosted);
    }

    let text = article.searchable_text();
    if contains_any(&text, &lanes.exclude) || contains_any(&text, &topic.exclude) {
        return Err(Rejection::Excluded);
    }

    let on_topic = if topic.required.is_empty() {
        contains_any(&text, &lanes.threat) || contains_any(&text, &lanes.advancement)
    } else {
        contains_any(&text, &topic.required)
    };
    if !on_topic {
        return Err(Rejection::OffTopic);
    }
    Ok(())
}

/// Return the first article of `articles` that passes every filter, as a
/// ready-to-post [`Candidate`].
///
/// Articles are considered in the order given; the source's recency order
/// therefore decides ties.
pub fn first_qualifying(
    articles: &[NewsArticle],
    topic: &TopicRule,
    lanes: &KeywordLanes,
    seen: SeenScopes<'_>,
) -> Option<Candidate> {
    for article in articles {
        match check(article, topic, lanes, seen) {
            Ok(()) => {
                return Some(Candidate {
                    title: article.title.clone().unwrap_or_default().trim().to_string(),
                    summary: clean_summary(article.description.as_deref().unwrap_or_default()),
                    image_url: article.url_to_image.clone().unwrap_or_default(),
                    link: article.url.clone().unwrap_or_default(),
                    published_at: article.published_at.clone(),
                });
            }
            Err(reason) => {
                debug!(
                    topic = %topic.name,
                    url = ?article.url,
                    host = ?article.source_host(),
                    ?reason,
                    "Skipping article"
                );
            }
        }
    }
    None
}

/// Search for `topic` and return the first qualifying, unseen article.
///
/// `Ok(None)` covers both "the source returned nothing" and "nothing
/// survived filtering"; neither is an error for the caller.
#[instrument(level = "info", skip_all, fields(topic = %topic.name))]
pub async fn select<S: NewsSource>(
    source: &S,
    topic: &TopicRule,
    lanes: &KeywordLanes,
    settings: &SearchSettings,
    seen: SeenScopes<'_>,
) -> Result<Option<Candidate>, NewsError> {
    let query = NewsQuery::for_topic(
        topic,
        &settings.language,
        settings.page_size,
        settings.lookback_days,
    );
    let articles = source.search(&query).await?;
    if articles.is_empty() {
        info!("News source returned no articles");
        return Ok(None);
    }

    let selected = first_qualifying(&articles, topic, lanes, seen);
    match &selected {
        Some(c) => info!(title = %c.title, link = %c.link, "Selected new article"),
        None => info!(
            considered = articles.len(),
            "No article passed the filters"
        ),
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use std::cell::RefCell;

    fn article(title: &str, desc: &str, url: &str, image: Option<&str>) -> NewsArticle {
        NewsArticle {
            title: Some(title.to_string()),
            description: Some(desc.to_string()),
            url: Some(url.to_string()),
            url_to_image: image.map(str::to_string),
            published_at: Some("2025-05-06T10:00:00Z".to_string()),
        }
    }

    fn lanes() -> KeywordLanes {
        KeywordLanes {
            threat: vec!["ransomware".to_string(), "breach".to_string()],
            advancement: vec!["zero trust".to_string()],
            exclude: vec!["arrest".to_string()],
        }
    }

    fn scopes<'a>(topic: &'a SeenSet, global: &'a SeenSet) -> SeenScopes<'a> {
        SeenScopes { topic, global }
    }

    fn open_topic() -> TopicRule {
        TopicRule {
            name: "security".to_string(),
            domains: vec!["thehackernews.com".to_string()],
            query: "security".to_string(),
            required: Vec::new(),
            exclude: vec!["sponsored".to_string()],
            emoji: "🔐".to_string(),
            title: "Security Update".to_string(),
            hashtags: "#InfoSec".to_string(),
        }
    }

    fn strict_topic() -> TopicRule {
        TopicRule {
            name: "cloud".to_string(),
            required: vec!["Kubernetes".to_string()],
            exclude: Vec::new(),
            ..open_topic()
        }
    }

    #[test]
    fn test_selects_first_matching_article() {
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);
        let articles = vec![
            article("Weather today", "Sunny", "https://x.com/0", Some("https://x.com/0.jpg")),
            article(
                "Ransomware hits hospital",
                "Systems down... [+200 chars]",
                "https://x.com/1",
                Some("https://x.com/1.jpg"),
            ),
            article(
                "Another breach",
                "Data leaked",
                "https://x.com/2",
                Some("https://x.com/2.jpg"),
            ),
        ];

        let c = first_qualifying(&articles, &open_topic(), &lanes(), seen).unwrap();
        assert_eq!(c.link, "https://x.com/1");
        assert_eq!(c.summary, "Systems down");
        assert_eq!(c.image_url, "https://x.com/1.jpg");
    }

    #[test]
    fn test_skips_missing_link_or_image() {
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);
        let mut no_link = article("Ransomware", "", "", Some("https://x.com/a.jpg"));
        no_link.url = None;
        let articles = vec![
            no_link,
            article("Ransomware", "", "https://x.com/1", None),
            article("Ransomware", "", "https://x.com/2", Some("  ")),
        ];
        assert!(first_qualifying(&articles, &open_topic(), &lanes(), seen).is_none());
    }

    #[test]
    fn test_skips_links_seen_in_either_scope() {
        let mut topic_seen = SeenSet::default();
        topic_seen.insert("https://x.com/1");
        let mut global_seen = SeenSet::default();
        global_seen.insert("https://x.com/2");
        let seen = scopes(&topic_seen, &global_seen);

        let articles = vec![
            article("Ransomware one", "", "https://x.com/1", Some("https://x.com/i.jpg")),
            article("Ransomware two", "", "https://x.com/2", Some("https://x.com/i.jpg")),
            article("Ransomware three", "", "https://x.com/3", Some("https://x.com/i.jpg")),
        ];
        let c = first_qualifying(&articles, &open_topic(), &lanes(), seen).unwrap();
        assert_eq!(c.link, "https://x.com/3");
    }

    #[test]
    fn test_global_seen_only_article_yields_none() {
        let empty = SeenSet::default();
        let mut global_seen = SeenSet::default();
        global_seen.insert("https://x.com/1");
        let seen = scopes(&empty, &global_seen);
        let articles = vec![article(
            "Ransomware",
            "",
            "https://x.com/1",
            Some("https://x.com/i.jpg"),
        )];
        assert!(first_qualifying(&articles, &open_topic(), &lanes(), seen).is_none());
    }

    #[test]
    fn test_exclusions_beat_required_matches() {
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);
        let articles = vec![
            article("Kubernetes gang ARREST", "", "https://x.com/1", Some("https://x.com/i.jpg")),
        ];
        assert!(first_qualifying(&articles, &strict_topic(), &lanes(), seen).is_none());

        // topic-specific exclusion
        let articles = vec![
            article(
                "Ransomware webinar",
                "Sponsored content",
                "https://x.com/2",
                Some("https://x.com/i.jpg"),
            ),
        ];
        assert!(first_qualifying(&articles, &open_topic(), &lanes(), seen).is_none());
    }

    #[test]
    fn test_required_list_replaces_fallback_lanes() {
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);
        let articles = vec![
            article("Ransomware strikes", "", "https://x.com/1", Some("https://x.com/i.jpg")),
            article("kubernetes 1.33 released", "", "https://x.com/2", Some("https://x.com/i.jpg")),
        ];
        let c = first_qualifying(&articles, &strict_topic(), &lanes(), seen).unwrap();
        assert_eq!(c.link, "https://x.com/2");
    }

    #[test]
    fn test_advancement_lane_matches_description() {
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);
        let articles = vec![article(
            "Agency publishes guidance",
            "A Zero Trust roadmap for federal networks",
            "https://x.com/1",
            Some("https://x.com/i.jpg"),
        )];
        assert!(first_qualifying(&articles, &open_topic(), &lanes(), seen).is_some());
    }

    #[test]
    fn test_summary_is_capped() {
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);
        let long = "ransomware ".repeat(60);
        let articles = vec![article(
            "Breach",
            &long,
            "https://x.com/1",
            Some("https://x.com/i.jpg"),
        )];
        let c = first_qualifying(&articles, &open_topic(), &lanes(), seen).unwrap();
        assert!(c.summary.chars().count() <= crate::utils::SUMMARY_MAX_CHARS);
    }

    struct FixedSource {
        articles: Vec<NewsArticle>,
        queries: RefCell<Vec<NewsQuery>>,
    }

    impl NewsSource for FixedSource {
        async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsArticle>, NewsError> {
            self.queries.borrow_mut().push(query.clone());
            Ok(self.articles.clone())
        }
    }

    #[tokio::test]
    async fn test_select_queries_topic_and_filters() {
        let config = BotConfig::default();
        let topic = &config.topics[0];
        let source = FixedSource {
            articles: vec![article(
                "Critical vulnerability exploited",
                "Patch now.",
                "https://thehackernews.com/a",
                Some("https://thehackernews.com/a.jpg"),
            )],
            queries: RefCell::new(Vec::new()),
        };
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);

        let c = select(&source, topic, &config.lanes, &SearchSettings::default(), seen)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.summary, "Patch now");

        let queries = source.queries.borrow();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].query, topic.query);
        assert_eq!(queries[0].page_size, 50);
        assert_eq!(queries[0].language, "en");
    }

    #[tokio::test]
    async fn test_select_empty_source_is_none() {
        let config = BotConfig::default();
        let source = FixedSource {
            articles: Vec::new(),
            queries: RefCell::new(Vec::new()),
        };
        let empty = SeenSet::default();
        let seen = scopes(&empty, &empty);
        let settings = SearchSettings::default();
        let result = select(&source, &config.topics[0], &config.lanes, &settings, seen)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
