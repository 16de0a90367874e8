//! HTTP publisher for the video-hosting platform.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::PublishingConfig;
use crate::credentials::CredentialEntry;
use crate::metrics;

use super::{PublishError, PublishRequest, Publisher};

const SERVICE: &str = "publishing";
const ERROR_BODY_MAX_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Uploads a video plus metadata in one multipart request.
pub struct HttpPublisher {
    client: Client,
    config: PublishingConfig,
}

impl HttpPublisher {
    pub fn new(config: PublishingConfig) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| PublishError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.upload_path
        )
    }

    /// Resource metadata: scheduled publishing needs a private upload with `publishAt`.
    fn metadata(&self, request: &PublishRequest) -> serde_json::Value {
        json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "tags": request.tags,
                "categoryId": self.config.category_id,
            },
            "status": {
                "privacyStatus": self.config.privacy,
                "publishAt": request.publish_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                "selfDeclaredMadeForKids": false,
            }
        })
    }

    fn bearer(secret: &str) -> String {
        if secret.starts_with("Bearer ") {
            secret.to_string()
        } else {
            format!("Bearer {}", secret)
        }
    }

    async fn upload(
        &self,
        request: &PublishRequest,
        credential: &CredentialEntry,
    ) -> Result<String, PublishError> {
        let metadata = multipart::Part::text(self.metadata(request).to_string())
            .mime_str("application/json; charset=UTF-8")
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let video = multipart::Part::bytes(request.video.to_vec())
            .file_name(format!("{}.mp4", request.title))
            .mime_str("video/mp4")
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let form = multipart::Form::new()
            .part("metadata", metadata)
            .part("video", video);

        let response = self
            .client
            .post(self.upload_url())
            .header("authorization", Self::bearer(&credential.secret))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_MAX_CHARS)
                .collect();
            return Err(match status.as_u16() {
                401 => PublishError::Unauthorized(body),
                403 if body.contains("quota") => PublishError::QuotaExceeded(body),
                403 => PublishError::Unauthorized(body),
                code => PublishError::Rejected { status: code, body },
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Malformed(e.to_string()))?;
        uploaded
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PublishError::Malformed("upload response has no id".to_string()))
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn name(&self) -> &str {
        "http"
    }

    async fn publish(
        &self,
        request: &PublishRequest,
        credential: &CredentialEntry,
    ) -> Result<String, PublishError> {
        let started = Instant::now();
        debug!(
            "Uploading {} ({} bytes) with credential {}",
            request.item_id,
            request.video.len(),
            credential.redacted()
        );
        let result = self.upload(request, credential).await;
        metrics::observe_external(
            SERVICE,
            "upload",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};

    fn request() -> PublishRequest {
        PublishRequest {
            item_id: "a".to_string(),
            title: "Harbor".to_string(),
            description: "Fog rolls in".to_string(),
            tags: vec!["sea".to_string(), "fog".to_string()],
            publish_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            video: Bytes::from_static(b"mp4"),
        }
    }

    #[test]
    fn test_metadata_shape() {
        let publisher = HttpPublisher::new(PublishingConfig::default()).unwrap();
        let metadata = publisher.metadata(&request());
        assert_eq!(metadata["snippet"]["title"], "Harbor");
        assert_eq!(metadata["snippet"]["tags"][1], "fog");
        assert_eq!(metadata["snippet"]["categoryId"], "22");
        assert_eq!(metadata["status"]["privacyStatus"], "private");
        assert_eq!(metadata["status"]["publishAt"], "2025-03-01T10:00:00Z");
    }

    #[test]
    fn test_bearer_prefix() {
        assert_eq!(HttpPublisher::bearer("ya29.x"), "Bearer ya29.x");
        assert_eq!(HttpPublisher::bearer("Bearer ya29.x"), "Bearer ya29.x");
    }

    #[test]
    fn test_upload_url() {
        let config = PublishingConfig {
            base_url: "https://upload.example.com/".to_string(),
            upload_path: "/videos".to_string(),
            ..Default::default()
        };
        let publisher = HttpPublisher::new(config).unwrap();
        assert_eq!(publisher.upload_url(), "https://upload.example.com/videos");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let config = PublishingConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let publisher = HttpPublisher::new(config).unwrap();
        let err = publisher
            .publish(&request(), &CredentialEntry::new(0, "token"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }
}
