//! Content records supplied by the external script provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the content provider. A failure rejects the whole batch.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content request invalid: {0}")]
    InvalidRequest(String),

    #[error("content provider failed: {0}")]
    Provider(String),

    #[error("content provider returned malformed records: {0}")]
    Malformed(String),
}

/// Requested clip length. Each bucket maps to a fixed frame count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationBucket {
    #[default]
    #[serde(rename = "10s")]
    Short,
    #[serde(rename = "15s")]
    Long,
}

impl DurationBucket {
    pub fn frame_count(&self) -> u32 {
        match self {
            DurationBucket::Short => 300,
            DurationBucket::Long => 450,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationBucket::Short => "10s",
            DurationBucket::Long => "15s",
        }
    }
}

impl std::str::FromStr for DurationBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "10s" | "short" => Ok(DurationBucket::Short),
            "15s" | "long" => Ok(DurationBucket::Long),
            other => Err(format!("unsupported duration: {}", other)),
        }
    }
}

/// Scene description triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDetails {
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub lighting: String,
    #[serde(default)]
    pub atmosphere: String,
}

/// Immutable content of one work item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub visual_prompt: String,
    #[serde(default, alias = "videoDescription")]
    pub description: String,
    #[serde(default, alias = "videoTags")]
    pub tags: Vec<String>,
    #[serde(default, alias = "sceneDetails")]
    pub scene: SceneDetails,
    #[serde(default)]
    pub camera_movement: String,
    #[serde(default)]
    pub duration_estimate: String,
    #[serde(default)]
    pub notes: String,
}

impl ContentRecord {
    /// Prompt sent to the generation backend.
    pub fn prompt(&self) -> &str {
        if self.visual_prompt.trim().is_empty() {
            &self.concept
        } else {
            &self.visual_prompt
        }
    }
}

/// Give every record without an id a fresh one.
pub fn assign_missing_ids(records: &mut [ContentRecord]) {
    for record in records.iter_mut() {
        if record.id.trim().is_empty() {
            record.id = uuid::Uuid::new_v4().to_string();
        }
    }
}

/// Request sent to the content provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    /// Free-text idea.
    pub idea: String,
    /// Desired number of records.
    pub count: usize,
    #[serde(default)]
    pub duration: DurationBucket,
}

impl ContentRequest {
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.idea.trim().is_empty() {
            return Err(ContentError::InvalidRequest("idea is empty".to_string()));
        }
        if self.count == 0 {
            return Err(ContentError::InvalidRequest("count must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Black-box provider of structured content records.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Produce `request.count` records, or fail as a whole.
    async fn generate(&self, request: &ContentRequest) -> Result<Vec<ContentRecord>, ContentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_frame_counts() {
        assert_eq!(DurationBucket::Short.frame_count(), 300);
        assert_eq!(DurationBucket::Long.frame_count(), 450);
        assert_eq!("15s".parse::<DurationBucket>().unwrap(), DurationBucket::Long);
        assert!("20s".parse::<DurationBucket>().is_err());
    }

    #[test]
    fn test_duration_serialization() {
        assert_eq!(serde_json::to_string(&DurationBucket::Short).unwrap(), "\"10s\"");
        let parsed: DurationBucket = serde_json::from_str("\"15s\"").unwrap();
        assert_eq!(parsed, DurationBucket::Long);
    }

    #[test]
    fn test_prompt_falls_back_to_concept() {
        let mut record = ContentRecord {
            title: "t".to_string(),
            concept: "a quiet harbor".to_string(),
            ..Default::default()
        };
        assert_eq!(record.prompt(), "a quiet harbor");

        record.visual_prompt = "cinematic harbor at dawn".to_string();
        assert_eq!(record.prompt(), "cinematic harbor at dawn");
    }

    #[test]
    fn test_deserialize_provider_record() {
        let json = r#"{
            "title": "Neon Rain",
            "concept": "city",
            "visualPrompt": "neon streets",
            "videoDescription": "desc",
            "videoTags": ["a", "b"],
            "sceneDetails": {"setting": "s", "lighting": "l", "atmosphere": "a"},
            "cameraMovement": "dolly"
        }"#;
        let record: ContentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.visual_prompt, "neon streets");
        assert_eq!(record.description, "desc");
        assert_eq!(record.tags, vec!["a", "b"]);
        assert_eq!(record.scene.lighting, "l");
        assert!(record.id.is_empty());
    }

    #[test]
    fn test_assign_missing_ids() {
        let mut records = vec![
            ContentRecord {
                id: "keep".to_string(),
                ..Default::default()
            },
            ContentRecord::default(),
        ];
        assign_missing_ids(&mut records);
        assert_eq!(records[0].id, "keep");
        assert!(!records[1].id.is_empty());
    }

    #[test]
    fn test_request_validation() {
        let ok = ContentRequest {
            idea: "ocean".to_string(),
            count: 3,
            duration: DurationBucket::Short,
        };
        assert!(ok.validate().is_ok());

        let empty = ContentRequest {
            idea: " ".to_string(),
            ..ok.clone()
        };
        assert!(matches!(empty.validate(), Err(ContentError::InvalidRequest(_))));

        let zero = ContentRequest { count: 0, ..ok };
        assert!(zero.validate().is_err());
    }
}
