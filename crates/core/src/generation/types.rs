//! Types for the remote generation backend.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::content::DurationBucket;
use crate::credentials::GenerationAuth;

/// Errors from one stage of a production pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Backend answered the create call with a non-2xx status.
    #[error("backend responded with error ({status}): {body}")]
    Submission { status: u16, body: String },

    /// Network-level failure.
    #[error("connection failed: {0}")]
    Transport(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// Backend reported the task as failed.
    #[error("task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("production timeout after {elapsed_secs}s")]
    PollTimeout { task_id: String, elapsed_secs: i64 },

    #[error("artifact fetch failed: {0}")]
    Fetch(String),
}

impl GenerationError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Submission { .. } => "submission",
            GenerationError::Transport(_) => "transport",
            GenerationError::Malformed(_) => "malformed",
            GenerationError::TaskFailed { .. } => "task_failed",
            GenerationError::PollTimeout { .. } => "poll_timeout",
            GenerationError::Fetch(_) => "fetch",
        }
    }
}

/// Body of the create-job call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTaskRequest {
    pub kind: String,
    pub prompt: String,
    pub orientation: String,
    pub size: String,
    pub n_frames: u32,
    pub model: String,
    pub n: u32,
}

impl CreateTaskRequest {
    /// Build a single-video request for `prompt`.
    pub fn video(prompt: impl Into<String>, duration: DurationBucket, config: &GenerationConfig) -> Self {
        Self {
            kind: "video".to_string(),
            prompt: prompt.into(),
            orientation: config.orientation.clone(),
            size: config.size.clone(),
            n_frames: duration.frame_count(),
            model: config.model.clone(),
            n: 1,
        }
    }
}

/// Nested result object some listings carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTaskResult {
    #[serde(default)]
    pub video_url: Option<String>,
}

/// One record of the status listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Creation time in unix seconds.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub downloadable_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub result: Option<RemoteTaskResult>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl RemoteTask {
    /// First non-empty artifact reference, in preference order.
    pub fn artifact_url(&self) -> Option<&str> {
        [
            self.downloadable_url.as_deref(),
            self.url.as_deref(),
            self.result.as_ref().and_then(|r| r.video_url.as_deref()),
        ]
        .into_iter()
        .flatten()
        .find(|u| !u.trim().is_empty())
    }

    /// Failure reported by the backend, if any.
    pub fn failure(&self) -> Option<String> {
        if let Some(reason) = self.failure_reason.as_deref().filter(|r| !r.trim().is_empty()) {
            return Some(reason.to_string());
        }
        match self.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some(s @ ("failed" | "error" | "cancelled" | "rejected")) => {
                Some(format!("backend status {}", s))
            }
            _ => None,
        }
    }
}

/// Accept unix seconds as a number, a numeric string, or RFC 3339.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.parse::<f64>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.timestamp() as f64)
        }),
        _ => None,
    })
}

/// Status listing: either a bare array or an object wrapping `items`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TaskListing {
    Bare(Vec<RemoteTask>),
    Wrapped {
        #[serde(default)]
        items: Vec<RemoteTask>,
    },
}

impl TaskListing {
    pub fn into_tasks(self) -> Vec<RemoteTask> {
        match self {
            TaskListing::Bare(tasks) => tasks,
            TaskListing::Wrapped { items } => items,
        }
    }
}

/// A submitted task the poller follows.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle {
    pub task_id: String,
    /// Prompt as submitted, used by the fallback matcher.
    pub prompt: String,
    pub submitted_at: DateTime<Utc>,
    /// Listing records created before this unix second never match by prompt.
    pub match_since: i64,
}

/// Trait for generation backends.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logging/metrics.
    fn name(&self) -> &str;

    /// Issue a create-job request and return the backend task id.
    async fn create_task(
        &self,
        request: &CreateTaskRequest,
        auth: &GenerationAuth,
    ) -> Result<String, GenerationError>;

    /// Fetch the recent task listing.
    async fn list_tasks(&self, auth: &GenerationAuth) -> Result<Vec<RemoteTask>, GenerationError>;

    /// Retrieve an artifact payload.
    async fn download(&self, url: &str) -> Result<Bytes, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_body() {
        let config = GenerationConfig::default();
        let request = CreateTaskRequest::video("ocean at dusk", DurationBucket::Long, &config);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["kind"], "video");
        assert_eq!(json["prompt"], "ocean at dusk");
        assert_eq!(json["orientation"], "landscape");
        assert_eq!(json["size"], "small");
        assert_eq!(json["n_frames"], 450);
        assert_eq!(json["model"], "sy_8");
        assert_eq!(json["n"], 1);
    }

    #[test]
    fn test_artifact_url_preference() {
        let mut task = RemoteTask {
            result: Some(RemoteTaskResult {
                video_url: Some("https://r/v.mp4".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(task.artifact_url(), Some("https://r/v.mp4"));

        task.url = Some("https://u/v.mp4".to_string());
        assert_eq!(task.artifact_url(), Some("https://u/v.mp4"));

        task.downloadable_url = Some("https://d/v.mp4".to_string());
        assert_eq!(task.artifact_url(), Some("https://d/v.mp4"));

        let empty = RemoteTask {
            downloadable_url: Some(String::new()),
            ..Default::default()
        };
        assert!(empty.artifact_url().is_none());
    }

    #[test]
    fn test_failure_detection() {
        let ok = RemoteTask {
            status: Some("processing".to_string()),
            ..Default::default()
        };
        assert!(ok.failure().is_none());

        let failed = RemoteTask {
            status: Some("FAILED".to_string()),
            ..Default::default()
        };
        assert!(failed.failure().unwrap().contains("failed"));

        let reason = RemoteTask {
            failure_reason: Some("content policy".to_string()),
            ..Default::default()
        };
        assert_eq!(reason.failure().as_deref(), Some("content policy"));
    }

    #[test]
    fn test_listing_shapes() {
        let bare: TaskListing = serde_json::from_str(r#"[{"id":"a"}]"#).unwrap();
        assert_eq!(bare.into_tasks().len(), 1);

        let wrapped: TaskListing =
            serde_json::from_str(r#"{"items":[{"id":"a"},{"id":"b"}]}"#).unwrap();
        assert_eq!(wrapped.into_tasks().len(), 2);

        let other: TaskListing = serde_json::from_str(r#"{"cursor":null}"#).unwrap();
        assert!(other.into_tasks().is_empty());
    }

    #[test]
    fn test_created_at_formats() {
        let numeric: RemoteTask = serde_json::from_str(r#"{"created_at": 1700000000.5}"#).unwrap();
        assert_eq!(numeric.created_at, Some(1700000000.5));

        let text: RemoteTask = serde_json::from_str(r#"{"created_at": "1700000000"}"#).unwrap();
        assert_eq!(text.created_at, Some(1700000000.0));

        let rfc: RemoteTask =
            serde_json::from_str(r#"{"created_at": "2023-11-14T22:13:20Z"}"#).unwrap();
        assert_eq!(rfc.created_at, Some(1700000000.0));

        let missing: RemoteTask = serde_json::from_str(r#"{}"#).unwrap();
        assert!(missing.created_at.is_none());
    }
}
