//! Artifact retrieval.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::item::Artifact;
use crate::metrics;

use super::{GenerationBackend, GenerationError};

/// Retrieves the payload a finished task points to.
pub struct ArtifactFetcher {
    backend: Arc<dyn GenerationBackend>,
    clock: Arc<dyn Clock>,
}

impl ArtifactFetcher {
    pub fn new(backend: Arc<dyn GenerationBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Download `url` into an in-memory [`Artifact`]. An empty body is a fetch error.
    pub async fn fetch(&self, url: &str) -> Result<Artifact, GenerationError> {
        let result = match self.backend.download(url).await {
            Ok(bytes) => Artifact::new(bytes, url, self.clock.now())
                .ok_or_else(|| GenerationError::Fetch(format!("empty artifact body from {}", url))),
            Err(GenerationError::Fetch(msg)) => Err(GenerationError::Fetch(msg)),
            Err(other) => Err(GenerationError::Fetch(other.to_string())),
        };

        match &result {
            Ok(artifact) => {
                metrics::ARTIFACT_FETCHES_TOTAL
                    .with_label_values(&["success"])
                    .inc();
                debug!("Fetched {} bytes from {}", artifact.size_bytes, url);
            }
            Err(e) => {
                metrics::ARTIFACT_FETCHES_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
                warn!("Artifact fetch failed: {}", e);
            }
        }
        result
    }
}
