//! Work item types.
//!
//! A work item is an immutable [`ContentRecord`] composed with a mutable
//! [`OrchestrationState`]. State only changes through [`ItemEvent`]s applied
//! by the [`ItemBoard`](super::ItemBoard).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::ContentRecord;

/// Errors raised when applying item events.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("item {item_id}: cannot apply {event} while {from}")]
    InvalidTransition {
        item_id: String,
        from: String,
        event: &'static str,
    },

    #[error("item {0} has no produced video")]
    NoArtifact(String),
}

/// Production status of a work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Idle,
    Processing,
    Monitoring,
    Completed,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Idle => "idle",
            ItemStatus::Processing => "processing",
            ItemStatus::Monitoring => "monitoring",
            ItemStatus::Completed => "completed",
            ItemStatus::Error => "error",
        }
    }

    /// Whether a production pipeline is currently driving the item.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ItemStatus::Processing | ItemStatus::Monitoring)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error)
    }
}

/// Publishing status, meaningful only for completed items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    #[default]
    None,
    Uploading,
    Success,
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::None => "none",
            PublishStatus::Uploading => "uploading",
            PublishStatus::Success => "success",
            PublishStatus::Failed => "failed",
        }
    }
}

/// Fetched binary result of a generation task.
///
/// Never empty: construction fails on an empty payload.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    #[serde(skip)]
    data: Bytes,
    pub size_bytes: usize,
    /// Where the payload was retrieved from.
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        data: Bytes,
        source_url: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        Some(Self {
            size_bytes: data.len(),
            data,
            source_url: source_url.into(),
            fetched_at,
        })
    }

    /// Cheap clone of the payload.
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }
}

/// Mutable orchestration state of one work item.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestrationState {
    pub status: ItemStatus,
    /// Human-readable trace, replaced on every transition.
    pub progress_log: String,
    pub started_at: Option<DateTime<Utc>>,
    pub task_id: Option<String>,
    /// Present iff `status == Completed`.
    pub artifact: Option<Artifact>,
    pub publish_status: PublishStatus,
    /// Present iff `publish_status == Success`.
    pub publish_id: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl OrchestrationState {
    /// Seconds since processing began, if it began.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at.map(|start| (now - start).num_seconds().max(0))
    }
}

/// A content record together with its orchestration state.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub content: ContentRecord,
    pub state: OrchestrationState,
}

impl WorkItem {
    pub fn new(content: ContentRecord) -> Self {
        Self {
            content,
            state: OrchestrationState::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.content.id
    }

    /// Completed with a retrievable artifact.
    pub fn is_publishable(&self) -> bool {
        self.state.status == ItemStatus::Completed && self.state.artifact.is_some()
    }
}

/// A state change for one item (or the whole batch).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEvent {
    /// The item list was replaced.
    BatchLoaded { count: usize },
    /// Processing began (fresh or resubmitted).
    Started {
        item_id: String,
        started_at: DateTime<Utc>,
        log: String,
    },
    /// The backend accepted the job; monitoring begins.
    Submitted {
        item_id: String,
        task_id: String,
        log: String,
    },
    Completed {
        item_id: String,
        artifact: Artifact,
        log: String,
    },
    Failed { item_id: String, log: String },
    ContentEdited {
        item_id: String,
        content: ContentRecord,
    },
    Scheduled {
        item_id: String,
        at: Option<DateTime<Utc>>,
    },
    PublishStarted { item_id: String },
    Published { item_id: String, publish_id: String },
    PublishFailed { item_id: String, reason: String },
}

impl ItemEvent {
    pub fn item_id(&self) -> Option<&str> {
        match self {
            ItemEvent::BatchLoaded { .. } => None,
            ItemEvent::Started { item_id, .. }
            | ItemEvent::Submitted { item_id, .. }
            | ItemEvent::Completed { item_id, .. }
            | ItemEvent::Failed { item_id, .. }
            | ItemEvent::ContentEdited { item_id, .. }
            | ItemEvent::Scheduled { item_id, .. }
            | ItemEvent::PublishStarted { item_id }
            | ItemEvent::Published { item_id, .. }
            | ItemEvent::PublishFailed { item_id, .. } => Some(item_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ItemEvent::BatchLoaded { .. } => "batch_loaded",
            ItemEvent::Started { .. } => "started",
            ItemEvent::Submitted { .. } => "submitted",
            ItemEvent::Completed { .. } => "completed",
            ItemEvent::Failed { .. } => "failed",
            ItemEvent::ContentEdited { .. } => "content_edited",
            ItemEvent::Scheduled { .. } => "scheduled",
            ItemEvent::PublishStarted { .. } => "publish_started",
            ItemEvent::Published { .. } => "published",
            ItemEvent::PublishFailed { .. } => "publish_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_rejects_empty_payload() {
        assert!(Artifact::new(Bytes::new(), "https://x/a.mp4", Utc::now()).is_none());
        let artifact = Artifact::new(Bytes::from_static(b"mp4"), "https://x/a.mp4", Utc::now()).unwrap();
        assert_eq!(artifact.size_bytes, 3);
        assert_eq!(artifact.data().as_ref(), b"mp4");
    }

    #[test]
    fn test_artifact_serialization_omits_payload() {
        let artifact = Artifact::new(Bytes::from_static(b"abc"), "u", Utc::now()).unwrap();
        let json = serde_json::to_value(&artifact).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["size_bytes"], 3);
    }

    #[test]
    fn test_status_helpers() {
        assert!(ItemStatus::Processing.is_in_flight());
        assert!(ItemStatus::Monitoring.is_in_flight());
        assert!(!ItemStatus::Completed.is_in_flight());
        assert!(ItemStatus::Error.is_terminal());
        assert!(!ItemStatus::Idle.is_terminal());
        assert_eq!(
            serde_json::to_string(&ItemStatus::Monitoring).unwrap(),
            "\"monitoring\""
        );
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ItemEvent::Failed {
            item_id: "a".to_string(),
            log: "boom".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(event.item_id(), Some("a"));
        assert_eq!(ItemEvent::BatchLoaded { count: 2 }.item_id(), None);
    }

    #[test]
    fn test_elapsed_secs() {
        let mut state = OrchestrationState::default();
        let now = Utc::now();
        assert!(state.elapsed_secs(now).is_none());
        state.started_at = Some(now - chrono::Duration::seconds(42));
        assert_eq!(state.elapsed_secs(now), Some(42));
    }
}
