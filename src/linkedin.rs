//! LinkedIn publisher: image upload followed by a UGC post.
//!
//! # Flow
//!
//! 1. `POST /v2/assets?action=registerUpload` returns an upload URL and an
//!    asset URN
//! 2. the article image is downloaded and `PUT` to the upload URL
//! 3. `POST /v2/ugcPosts` creates a public post referencing the asset
//!
//! A post counts as published only when step 3 answers `201 Created` and
//! names the new post, either in the body `id` or the `x-restli-id` header.

use crate::config::TopicRule;
use crate::errors::PublishError;
use crate::models::{Candidate, PostReceipt};
use crate::publisher::{Publisher, compose_post_text};
use crate::utils::truncate_for_log;
use chrono::Local;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Public LinkedIn REST endpoint.
pub const DEFAULT_LINKEDIN_API_URL: &str = "https://api.linkedin.com";

const UPLOAD_MECHANISM: &str = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest";

#[derive(Debug, Deserialize)]
struct RegisterUploadResponse {
    value: Option<RegisterUploadValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUploadValue {
    asset: Option<String>,
    upload_mechanism: Option<UploadMechanism>,
}

#[derive(Debug, Deserialize)]
struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    http_request: Option<UploadRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    upload_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    id: Option<String>,
}

/// Where to upload an image and which asset it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub upload_url: String,
    pub asset: String,
}

/// Client for the LinkedIn assets and UGC post endpoints.
pub struct LinkedInClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
    /// Author URN, e.g. `urn:li:person:abc123`.
    author: String,
}

impl fmt::Debug for LinkedInClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedInClient")
            .field("base_url", &self.base_url.as_str())
            .field("author", &self.author)
            .finish_non_exhaustive()
    }
}

impl LinkedInClient {
    pub fn new(http: reqwest::Client, base_url: Url, access_token: String, author: String) -> Self {
        Self {
            http,
            base_url,
            access_token,
            author,
        }
    }

    fn api(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
    }

    /// Ask LinkedIn for an image upload slot owned by the author.
    #[instrument(level = "info", skip_all)]
    pub async fn register_upload(&self) -> Result<UploadTarget, PublishError> {
        let mut url = self.api("/v2/assets");
        url.set_query(Some("action=registerUpload"));

        let payload = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": self.author,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let resp = self.authed(self.http.post(url)).json(&payload).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(PublishError::RegisterUpload {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let parsed: RegisterUploadResponse = serde_json::from_str(&body)
            .map_err(|_| PublishError::MalformedRegisterResponse { field: "value" })?;
        let value = parsed
            .value
            .ok_or(PublishError::MalformedRegisterResponse { field: "value" })?;
        let asset = value
            .asset
            .filter(|a| !a.is_empty())
            .ok_or(PublishError::MalformedRegisterResponse { field: "asset" })?;
        let upload_url = value
            .upload_mechanism
            .and_then(|m| m.http_request)
            .and_then(|r| r.upload_url)
            .filter(|u| !u.is_empty())
            .ok_or(PublishError::MalformedRegisterResponse {
                field: UPLOAD_MECHANISM,
            })?;

        debug!(%asset, "Registered image upload");
        Ok(UploadTarget { upload_url, asset })
    }

    /// Download the article image and upload it to `target`.
    #[instrument(level = "info", skip_all, fields(%image_url))]
    pub async fn upload_image(
        &self,
        target: &UploadTarget,
        image_url: &str,
    ) -> Result<(), PublishError> {
        let t0 = Instant::now();
        let image = self.http.get(image_url).send().await?;
        if !image.status().is_success() {
            return Err(PublishError::ImageFetch {
                url: image_url.to_string(),
                status: image.status().as_u16(),
            });
        }
        let bytes = image.bytes().await?;

        let resp = self
            .http
            .put(&target.upload_url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.clone())
            .send()
            .await?;
        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::ImageUpload {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        info!(
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Uploaded image"
        );
        Ok(())
    }

    /// Create a public image post with `text` referencing `asset`.
    #[instrument(level = "info", skip_all, fields(%asset))]
    pub async fn create_post(
        &self,
        text: &str,
        asset: &str,
        media_title: &str,
    ) -> Result<PostReceipt, PublishError> {
        let payload = json!({
            "author": self.author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": {"text": text},
                    "shareMediaCategory": "IMAGE",
                    "media": [{
                        "status": "READY",
                        "media": asset,
                        "title": {"text": media_title}
                    }]
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
            }
        });

        let resp = self
            .authed(self.http.post(self.api("/v2/ugcPosts")))
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        let header_id = resp
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await?;

        if status != StatusCode::CREATED {
            return Err(PublishError::PostCreate {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let body_id = serde_json::from_str::<CreatePostResponse>(&body)
            .ok()
            .and_then(|r| r.id);
        let post_id = body_id
            .or(header_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or(PublishError::MissingConfirmation {
                status: status.as_u16(),
            })?;

        Ok(PostReceipt { post_id })
    }
}

impl Publisher for LinkedInClient {
    #[instrument(level = "info", skip_all, fields(topic = %topic.name, link = %candidate.link))]
    async fn publish(
        &self,
        candidate: &Candidate,
        topic: &TopicRule,
    ) -> Result<PostReceipt, PublishError> {
        let target = self.register_upload().await?;
        if let Err(e) = self.upload_image(&target, &candidate.image_url).await {
            warn!(error = %e, "Image upload failed; not creating post");
            return Err(e);
        }

        let text = compose_post_text(topic, candidate, Local::now().date_naive());
        let receipt = self.create_post(&text, &target.asset, &topic.title).await?;
        info!(post_id = %receipt.post_id, "Post created");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use wiremock::matchers::{body_bytes, body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> LinkedInClient {
        LinkedInClient::new(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            "token-123".to_string(),
            "urn:li:person:me".to_string(),
        )
    }

    fn candidate(server: &MockServer) -> Candidate {
        Candidate {
            title: "Ransomware hits hospital".to_string(),
            summary: "Systems are down".to_string(),
            image_url: format!("{}/images/a.jpg", server.uri()),
            link: "https://x.com/1".to_string(),
            published_at: None,
        }
    }

    async fn mount_register(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v2/assets"))
            .and(query_param("action", "registerUpload"))
            .and(header("Authorization", "Bearer token-123"))
            .and(header("X-Restli-Protocol-Version", "2.0.0"))
            .and(body_partial_json(serde_json::json!({
                "registerUploadRequest": {"owner": "urn:li:person:me"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": {
                    "uploadMechanism": {
                        "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest": {
                            "uploadUrl": format!("{}/upload/slot-1", server.uri()),
                            "headers": {}
                        }
                    },
                    "asset": "urn:li:digitalmediaAsset:A1"
                }
            })))
            .mount(server)
            .await;
    }

    async fn mount_image(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/images/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(server)
            .await;
    }

    async fn mount_upload(server: &MockServer, status: u16) {
        Mock::given(method("PUT"))
            .and(path("/upload/slot-1"))
            .and(header("Content-Type", "application/octet-stream"))
            .and(body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_publish_success() {
        let server = MockServer::start().await;
        mount_register(&server).await;
        mount_image(&server).await;
        mount_upload(&server, 201).await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(body_partial_json(serde_json::json!({
                "author": "urn:li:person:me",
                "lifecycleState": "PUBLISHED",
                "visibility": {"com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"}
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"id": "urn:li:share:42"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = BotConfig::default();
        let receipt = client(&server)
            .publish(&candidate(&server), &config.topics[0])
            .await
            .unwrap();
        assert_eq!(receipt.post_id, "urn:li:share:42");
    }

    #[tokio::test]
    async fn test_post_id_from_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:7"))
            .mount(&server)
            .await;

        let receipt = client(&server)
            .create_post("hello", "urn:li:digitalmediaAsset:A1", "Update")
            .await
            .unwrap();
        assert_eq!(receipt.post_id, "urn:li:share:7");
    }

    #[tokio::test]
    async fn test_created_without_id_is_not_confirmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_post("hello", "urn:li:digitalmediaAsset:A1", "Update")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::MissingConfirmation { status: 201 }));
    }

    #[tokio::test]
    async fn test_plain_ok_is_not_confirmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "urn:li:share:1"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .create_post("hello", "urn:li:digitalmediaAsset:A1", "Update")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::PostCreate { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_upload_failure_skips_post_creation() {
        let server = MockServer::start().await;
        mount_register(&server).await;
        mount_image(&server).await;
        mount_upload(&server, 500).await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let config = BotConfig::default();
        let err = client(&server)
            .publish(&candidate(&server), &config.topics[0])
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::ImageUpload { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_image_fetch_failure() {
        let server = MockServer::start().await;
        mount_register(&server).await;
        Mock::given(method("GET"))
            .and(path("/images/a.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = BotConfig::default();
        let err = client(&server)
            .publish(&candidate(&server), &config.topics[0])
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::ImageFetch { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_register_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/assets"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired token"))
            .mount(&server)
            .await;

        let err = client(&server).register_upload().await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::RegisterUpload { status: 401, ref body } if body == "expired token"
        ));
    }

    #[tokio::test]
    async fn test_register_missing_upload_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/assets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": {"asset": "urn:li:digitalmediaAsset:A1"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).register_upload().await.unwrap_err();
        assert!(matches!(err, PublishError::MalformedRegisterResponse { field: UPLOAD_MECHANISM }));
    }
}
