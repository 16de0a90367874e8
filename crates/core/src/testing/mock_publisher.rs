//! Mock publisher for testing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::credentials::CredentialEntry;
use crate::publishing::{PublishError, PublishRequest, Publisher};

/// A recorded publish attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPublish {
    pub item_id: String,
    pub secret: String,
    pub position: usize,
    pub publish_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the Publisher trait.
///
/// Every attempt is recorded. Attempts made with a rejected secret fail
/// with an authorization error; all others succeed with `mock_yt_nnnn`.
#[derive(Debug)]
pub struct MockPublisher {
    attempts: Arc<RwLock<Vec<RecordedPublish>>>,
    rejected_secrets: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<PublishError>>>,
    counter: Arc<RwLock<u32>>,
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(RwLock::new(Vec::new())),
            rejected_secrets: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            counter: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn attempts(&self) -> Vec<RecordedPublish> {
        self.attempts.read().await.clone()
    }

    /// Fail every attempt made with `secret`.
    pub async fn reject_secret(&self, secret: &str) {
        self.rejected_secrets.write().await.push(secret.to_string());
    }

    /// Fail the next attempt with `error`, whatever the credential.
    pub async fn set_next_error(&self, error: PublishError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(
        &self,
        request: &PublishRequest,
        credential: &CredentialEntry,
    ) -> Result<String, PublishError> {
        self.attempts.write().await.push(RecordedPublish {
            item_id: request.item_id.clone(),
            secret: credential.secret.clone(),
            position: credential.position,
            publish_at: request.publish_at,
            timestamp: Utc::now(),
        });

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if self
            .rejected_secrets
            .read()
            .await
            .iter()
            .any(|s| s == &credential.secret)
        {
            return Err(PublishError::Unauthorized(format!(
                "mock rejected credential #{}",
                credential.position + 1
            )));
        }

        let mut counter = self.counter.write().await;
        *counter += 1;
        Ok(format!("mock_yt_{:04}", *counter))
    }
}
