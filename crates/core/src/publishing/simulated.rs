//! Offline publisher for simulation mode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::clock::Clock;
use crate::credentials::CredentialEntry;

use super::{PublishError, PublishRequest, Publisher};

/// Publisher that waits a fixed delay and returns a `sim_yt_` id.
pub struct SimulatedPublisher {
    delay: Duration,
    clock: Arc<dyn Clock>,
}

impl SimulatedPublisher {
    pub fn new(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { delay, clock }
    }

    fn publish_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(7)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        format!("sim_yt_{}", suffix)
    }
}

#[async_trait]
impl Publisher for SimulatedPublisher {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn publish(
        &self,
        request: &PublishRequest,
        _credential: &CredentialEntry,
    ) -> Result<String, PublishError> {
        self.clock.sleep(self.delay).await;
        let id = Self::publish_id();
        debug!("Simulated upload of {} as {}", request.item_id, id);
        Ok(id)
    }
}
