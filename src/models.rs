//! Data models for news search results and publish receipts.
//!
//! - [`NewsArticle`]: one article record as returned by the news search API
//! - [`NewsApiResponse`]: the search response envelope
//! - [`Candidate`]: an article that passed every filter and is ready to post
//! - [`PostReceipt`]: proof that the platform created a post
//!
//! The API records use camelCase field names, so the structs rename on
//! (de)serialization rather than carrying non-snake-case fields.

use serde::{Deserialize, Serialize};

/// A single article record from the news search API.
///
/// Every field is optional because the upstream API routinely returns
/// `null` for description, image and even title.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Canonical link, used as the dedup identity.
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
}

impl NewsArticle {
    /// Lowercased `"{title} {description}"`, the text every keyword filter runs against.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {}",
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }

    /// Host of the article link, for logging.
    pub fn source_host(&self) -> Option<String> {
        self.url
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok())
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Envelope returned by the `everything` search endpoint.
///
/// On failure the API answers `{"status": "error", "code": ..., "message": ...}`
/// and omits `articles`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiResponse {
    pub status: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub total_results: Option<u64>,
    pub articles: Option<Vec<NewsArticle>>,
}

/// An article selected for posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// Cleaned, length-capped description used in the post body.
    pub summary: String,
    pub image_url: String,
    pub link: String,
    pub published_at: Option<String>,
}

/// Confirmation that the platform created a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    /// Platform identifier of the created post (e.g. `urn:li:share:123`).
    pub post_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_response_deserialization() {
        let json = r#"{
            "status": "ok",
            "totalResults": 1,
            "articles": [{
                "source": {"id": null, "name": "BleepingComputer"},
                "author": "Someone",
                "title": "New ransomware strain spotted",
                "description": "Researchers found a new strain [+1234 chars]",
                "url": "https://www.bleepingcomputer.com/news/a",
                "urlToImage": "https://www.bleepingcomputer.com/a.jpg",
                "publishedAt": "2025-05-06T14:30:00Z",
                "content": "..."
            }]
        }"#;

        let resp: NewsApiResponse = serde_json::from_str(json).unwrap();
        let articles = resp.articles.unwrap();
        assert_eq!(resp.total_results, Some(1));
        assert_eq!(articles.len(), 1);
        assert_eq!(
            articles[0].url_to_image.as_deref(),
            Some("https://www.bleepingcomputer.com/a.jpg")
        );
        assert_eq!(
            articles[0].published_at.as_deref(),
            Some("2025-05-06T14:30:00Z")
        );
    }

    #[test]
    fn test_error_response_has_no_articles() {
        let json = r#"{
            "status": "error",
            "code": "apiKeyInvalid",
            "message": "Your API key is invalid."
        }"#;
        let resp: NewsApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status.as_deref(), Some("error"));
        assert_eq!(resp.code.as_deref(), Some("apiKeyInvalid"));
        assert!(resp.articles.is_none());
    }

    #[test]
    fn test_null_fields_deserialize() {
        let json = r#"{
            "title": null,
            "description": null,
            "url": "https://x.com/a",
            "urlToImage": null,
            "publishedAt": null
        }"#;
        let article: NewsArticle = serde_json::from_str(json).unwrap();
        assert!(article.title.is_none());
        assert!(article.url_to_image.is_none());
    }

    #[test]
    fn test_searchable_text_lowercases_and_joins() {
        let article = NewsArticle {
            title: Some("Zero-Day In VPN".to_string()),
            description: Some("Patch NOW".to_string()),
            ..Default::default()
        };
        assert_eq!(article.searchable_text(), "zero-day in vpn patch now");
    }

    #[test]
    fn test_searchable_text_missing_fields() {
        let article = NewsArticle::default();
        assert_eq!(article.searchable_text(), " ");
    }

    #[test]
    fn test_source_host() {
        let article = NewsArticle {
            url: Some("https://thehackernews.com/2025/05/post.html".to_string()),
            ..Default::default()
        };
        assert_eq!(article.source_host(), Some("thehackernews.com".to_string()));

        let bad = NewsArticle {
            url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert_eq!(bad.source_host(), None);
    }
}
