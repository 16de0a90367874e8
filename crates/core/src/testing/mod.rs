//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every external boundary
//! (generation backend, publisher, content provider, clock), allowing the
//! production and publish batches to be exercised without network access
//! or real waits.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelpilot_core::testing::{MockClock, MockGenerationBackend, MockPublisher};
//!
//! let backend = MockGenerationBackend::new();
//! let publisher = MockPublisher::new();
//!
//! // Configure mock behavior
//! backend.set_ready_after_polls(2).await;
//! publisher.reject_secret("expired-token").await;
//!
//! // Build a Session with them...
//! ```

mod mock_clock;
mod mock_content_provider;
mod mock_generation_backend;
mod mock_publisher;

pub use mock_clock::MockClock;
pub use mock_content_provider::MockContentProvider;
pub use mock_generation_backend::{MockGenerationBackend, RecordedCreate};
pub use mock_publisher::{MockPublisher, RecordedPublish};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::content::{ContentRecord, SceneDetails};
    use crate::credentials::GenerationAuth;

    /// A content record with reasonable defaults and no id.
    pub fn content_record_without_id(title: &str) -> ContentRecord {
        ContentRecord {
            id: String::new(),
            title: title.to_string(),
            concept: format!("Concept for {}", title),
            visual_prompt: format!("Cinematic wide shot: {}", title),
            description: format!("{} in fifteen seconds.", title),
            tags: vec!["shorts".to_string(), "ai".to_string()],
            scene: SceneDetails {
                setting: "coastal town".to_string(),
                lighting: "golden hour".to_string(),
                atmosphere: "calm".to_string(),
            },
            camera_movement: "slow dolly in".to_string(),
            duration_estimate: "10s".to_string(),
            notes: String::new(),
        }
    }

    /// A content record with a fixed id.
    pub fn content_record(id: &str, title: &str) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            ..content_record_without_id(title)
        }
    }

    /// Generation auth for the given pool position.
    pub fn generation_auth(position: usize) -> GenerationAuth {
        GenerationAuth {
            authorization: format!("Bearer test-token-{}", position),
            sentinel_token: Some("{\"p\":\"test\"}".to_string()),
            position,
        }
    }

    /// Captured curl text for a generation credential.
    pub fn generation_curl(token: &str) -> String {
        format!(
            "curl 'https://sora.chatgpt.com/backend/nf/create' -H 'authorization: Bearer {}' -H 'openai-sentinel-token: {{\"p\":\"x\"}}'",
            token
        )
    }
}
