//! Types for the publishing backend.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::credentials::{CredentialEntry, RotationQueue};
use crate::item::WorkItem;

/// Errors from publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Pre-flight check failed; the batch did not start.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("credential rejected: {0}")]
    Unauthorized(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("publishing backend responded with error ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("connection failed: {0}")]
    Transport(String),

    #[error("malformed publishing response: {0}")]
    Malformed(String),

    /// Every credential of the batch working copy has failed.
    #[error("all publishing credentials failed{}", error_suffix(.last_error))]
    CredentialsExhausted { last_error: Option<String> },
}

fn error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(": {}", e))
        .unwrap_or_default()
}

/// Everything the publishing backend needs for one upload.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub item_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub publish_at: DateTime<Utc>,
    pub video: Bytes,
}

impl PublishRequest {
    /// Build a request from a completed, scheduled item.
    pub fn from_item(item: &WorkItem) -> Result<Self, PublishError> {
        let artifact = item.state.artifact.as_ref().ok_or_else(|| {
            PublishError::Validation(format!("\"{}\" has no video", item.content.title))
        })?;
        let publish_at = item.state.scheduled_at.ok_or_else(|| {
            PublishError::Validation(format!(
                "\"{}\" has no publish time set",
                item.content.title
            ))
        })?;

        Ok(Self {
            item_id: item.id().to_string(),
            title: item.content.title.clone(),
            description: item.content.description.clone(),
            tags: item.content.tags.clone(),
            publish_at,
            video: artifact.data(),
        })
    }
}

/// How a publish batch reaches the backend.
#[derive(Debug)]
pub enum PublishMode {
    /// Rotate over this working copy of the publishing pool.
    Live(RotationQueue),
    /// No network; every upload succeeds after a fixed delay.
    Simulation,
}

impl PublishMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::Live(_) => "live",
            PublishMode::Simulation => "simulation",
        }
    }
}

/// A successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedItem {
    pub item_id: String,
    pub publish_id: String,
    /// Pool position of the credential that worked (None when simulated).
    pub credential_position: Option<usize>,
}

/// An item that could not be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPublish {
    pub item_id: String,
    pub reason: String,
}

/// Outcome of one publish batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub succeeded: Vec<PublishedItem>,
    pub failed: Vec<FailedPublish>,
    /// Pool positions left in the working copy when the batch ended.
    pub remaining_credentials: Vec<usize>,
}

/// Trait for publishing backends.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Backend name for logging/metrics.
    fn name(&self) -> &str;

    /// Upload one item and return the published id.
    async fn publish(
        &self,
        request: &PublishRequest,
        credential: &CredentialEntry,
    ) -> Result<String, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentRecord;
    use crate::item::{Artifact, ItemStatus};

    fn completed_item(scheduled: bool) -> WorkItem {
        let mut item = WorkItem::new(ContentRecord {
            id: "a".to_string(),
            title: "Harbor".to_string(),
            description: "desc".to_string(),
            tags: vec!["sea".to_string()],
            ..Default::default()
        });
        item.state.status = ItemStatus::Completed;
        item.state.artifact = Artifact::new(Bytes::from_static(b"mp4"), "u", chrono::Utc::now());
        if scheduled {
            item.state.scheduled_at = Some(Utc::now());
        }
        item
    }

    #[test]
    fn test_request_from_item() {
        let request = PublishRequest::from_item(&completed_item(true)).unwrap();
        assert_eq!(request.item_id, "a");
        assert_eq!(request.tags, vec!["sea"]);
        assert_eq!(request.video.as_ref(), b"mp4");
    }

    #[test]
    fn test_request_requires_publish_time() {
        let err = PublishRequest::from_item(&completed_item(false)).unwrap_err();
        assert!(err.to_string().contains("Harbor"));
    }

    #[test]
    fn test_exhausted_message() {
        let err = PublishError::CredentialsExhausted {
            last_error: Some("quota exceeded: daily".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "all publishing credentials failed: quota exceeded: daily"
        );
        let bare = PublishError::CredentialsExhausted { last_error: None };
        assert_eq!(bare.to_string(), "all publishing credentials failed");
    }
}
