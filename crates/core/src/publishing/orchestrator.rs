//! Sequential publish batch with credential rotation.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::credentials::{CredentialEntry, RotationQueue};
use crate::item::{ItemBoard, ItemEvent, WorkItem};
use crate::metrics;

use super::{
    FailedPublish, PublishError, PublishMode, PublishReport, PublishRequest, PublishedItem,
    Publisher,
};

/// Publishes a batch of completed items one at a time.
///
/// Live batches rotate over a working copy of the publishing pool: a failed
/// credential is dropped for the rest of the batch and the same item is
/// retried with the next one. Items after an exhausted pool fail immediately.
pub struct BatchPublishOrchestrator {
    publisher: Arc<dyn Publisher>,
    simulator: Arc<dyn Publisher>,
    board: Arc<ItemBoard>,
}

impl BatchPublishOrchestrator {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        simulator: Arc<dyn Publisher>,
        board: Arc<ItemBoard>,
    ) -> Self {
        Self {
            publisher,
            simulator,
            board,
        }
    }

    /// Reject the batch if any item is not ready to publish.
    pub fn validate(items: &[WorkItem]) -> Result<(), PublishError> {
        if items.is_empty() {
            return Err(PublishError::Validation(
                "select at least one completed video".to_string(),
            ));
        }
        for item in items {
            if !item.is_publishable() {
                return Err(PublishError::Validation(format!(
                    "\"{}\" is not a completed video",
                    item.content.title
                )));
            }
            if item.state.scheduled_at.is_none() {
                return Err(PublishError::Validation(format!(
                    "\"{}\" has no publish time set",
                    item.content.title
                )));
            }
        }
        Ok(())
    }

    /// Run one batch. Only validation errors escape; per-item failures are
    /// recorded on the item and in the report.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        mode: PublishMode,
    ) -> Result<PublishReport, PublishError> {
        Self::validate(&items)?;

        info!(
            "Publishing {} items ({} mode)",
            items.len(),
            mode.as_str()
        );

        let mut report = PublishReport::default();
        let mut queue = match mode {
            PublishMode::Live(queue) => Some(queue),
            PublishMode::Simulation => None,
        };

        for item in &items {
            let request = PublishRequest::from_item(item)?;
            // The board is the source of truth: an item that changed since the
            // snapshot is skipped rather than uploaded untracked.
            if let Err(e) = self
                .board
                .apply(ItemEvent::PublishStarted {
                    item_id: request.item_id.clone(),
                })
                .await
            {
                warn!("Skipping {}: {}", request.item_id, e);
                metrics::ITEMS_PUBLISHED_TOTAL
                    .with_label_values(&["skipped"])
                    .inc();
                report.failed.push(FailedPublish {
                    item_id: request.item_id,
                    reason: e.to_string(),
                });
                continue;
            }

            let outcome = match queue.as_mut() {
                Some(queue) => self.publish_rotating(&request, queue).await,
                None => self
                    .simulator
                    .publish(&request, &CredentialEntry::new(0, "simulation"))
                    .await
                    .map(|id| (id, None)),
            };

            match outcome {
                Ok((publish_id, credential_position)) => {
                    metrics::ITEMS_PUBLISHED_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    info!("Published {} as {}", request.item_id, publish_id);
                    self.apply(ItemEvent::Published {
                        item_id: request.item_id.clone(),
                        publish_id: publish_id.clone(),
                    })
                    .await;
                    report.succeeded.push(PublishedItem {
                        item_id: request.item_id,
                        publish_id,
                        credential_position,
                    });
                }
                Err(e) => {
                    metrics::ITEMS_PUBLISHED_TOTAL
                        .with_label_values(&["failed"])
                        .inc();
                    error!("Publishing {} failed: {}", request.item_id, e);
                    self.apply(ItemEvent::PublishFailed {
                        item_id: request.item_id.clone(),
                        reason: e.to_string(),
                    })
                    .await;
                    report.failed.push(FailedPublish {
                        item_id: request.item_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.remaining_credentials = queue
            .map(|q| q.remaining_positions())
            .unwrap_or_default();
        info!(
            "Publish batch finished: {} succeeded, {} failed, {} credentials left",
            report.succeeded.len(),
            report.failed.len(),
            report.remaining_credentials.len()
        );
        Ok(report)
    }

    /// Try the head of `queue`, discarding credentials until one works.
    async fn publish_rotating(
        &self,
        request: &PublishRequest,
        queue: &mut RotationQueue,
    ) -> Result<(String, Option<usize>), PublishError> {
        let mut last_error: Option<String> = None;

        while let Some(credential) = queue.head().cloned() {
            match self.publisher.publish(request, &credential).await {
                Ok(id) => {
                    metrics::PUBLISH_ATTEMPTS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    return Ok((id, Some(credential.position)));
                }
                Err(e) => {
                    metrics::PUBLISH_ATTEMPTS_TOTAL
                        .with_label_values(&["failed"])
                        .inc();
                    metrics::CREDENTIAL_DISCARDS.inc();
                    warn!(
                        "Publishing credential {} failed: {}",
                        credential.redacted(),
                        e
                    );
                    last_error = Some(e.to_string());
                    queue.discard_head();
                    if !queue.is_exhausted() {
                        info!("Switching to next credential ({} left)", queue.len());
                    }
                }
            }
        }

        Err(PublishError::CredentialsExhausted { last_error })
    }

    async fn apply(&self, event: ItemEvent) {
        if let Err(e) = self.board.apply(event).await {
            warn!("Could not record publish progress: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentRecord;
    use crate::credentials::CredentialPool;
    use crate::item::{Artifact, ItemStatus, PublishStatus};
    use crate::testing::MockPublisher;
    use bytes::Bytes;
    use chrono::Utc;

    async fn board_with_completed(ids: &[&str], scheduled: bool) -> Arc<ItemBoard> {
        let board = Arc::new(ItemBoard::new());
        board
            .replace_all(
                ids.iter()
                    .map(|id| ContentRecord {
                        id: id.to_string(),
                        title: format!("Video {}", id),
                        ..Default::default()
                    })
                    .collect(),
            )
            .await;
        for id in ids {
            for event in [
                ItemEvent::Started {
                    item_id: id.to_string(),
                    started_at: Utc::now(),
                    log: String::new(),
                },
                ItemEvent::Submitted {
                    item_id: id.to_string(),
                    task_id: format!("task_{}", id),
                    log: String::new(),
                },
                ItemEvent::Completed {
                    item_id: id.to_string(),
                    artifact: Artifact::new(Bytes::from_static(b"mp4"), "u", Utc::now()).unwrap(),
                    log: String::new(),
                },
            ] {
                board.apply(event).await.unwrap();
            }
            if scheduled {
                board
                    .apply(ItemEvent::Scheduled {
                        item_id: id.to_string(),
                        at: Some(Utc::now()),
                    })
                    .await
                    .unwrap();
            }
        }
        board
    }

    fn orchestrator(
        publisher: Arc<MockPublisher>,
        board: Arc<ItemBoard>,
    ) -> BatchPublishOrchestrator {
        BatchPublishOrchestrator::new(publisher, Arc::new(MockPublisher::new()), board)
    }

    #[tokio::test]
    async fn test_rotation_discards_failed_credentials_for_rest_of_batch() {
        let board = board_with_completed(&["one", "two"], true).await;
        let publisher = Arc::new(MockPublisher::new());
        publisher.reject_secret("A").await;
        publisher.reject_secret("B").await;
        let pool = CredentialPool::from_secrets(["A", "B", "C"]);

        let report = orchestrator(publisher.clone(), board.clone())
            .run(board.list().await, PublishMode::Live(pool.working_copy()))
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.succeeded[0].credential_position, Some(2));
        assert_eq!(report.remaining_credentials, vec![2]);

        // Second item went straight to C.
        let secrets: Vec<String> = publisher
            .attempts()
            .await
            .into_iter()
            .map(|a| a.secret)
            .collect();
        assert_eq!(secrets, vec!["A", "B", "C", "C"]);

        // Persisted pool untouched.
        assert_eq!(pool.len(), 3);

        let item = board.get("one").await.unwrap();
        assert_eq!(item.state.publish_status, PublishStatus::Success);
        assert!(item.state.publish_id.is_some());
    }

    #[tokio::test]
    async fn test_empty_pool_fails_item_without_escaping() {
        let board = board_with_completed(&["one"], true).await;
        let publisher = Arc::new(MockPublisher::new());

        let report = orchestrator(publisher.clone(), board.clone())
            .run(
                board.list().await,
                PublishMode::Live(CredentialPool::new().working_copy()),
            )
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(report.succeeded.is_empty());
        let item = board.get("one").await.unwrap();
        assert_eq!(item.state.publish_status, PublishStatus::Failed);
        assert!(item.state.publish_id.is_none());
        assert!(publisher.attempts().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_fails_remaining_items() {
        let board = board_with_completed(&["one", "two"], true).await;
        let publisher = Arc::new(MockPublisher::new());
        publisher.reject_secret("A").await;

        let report = orchestrator(publisher.clone(), board.clone())
            .run(
                board.list().await,
                PublishMode::Live(CredentialPool::from_secrets(["A"]).working_copy()),
            )
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].reason.contains("rejected"));
        assert!(report.remaining_credentials.is_empty());
        assert_eq!(publisher.attempts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_publish_time_rejects_whole_batch() {
        let board = board_with_completed(&["one"], false).await;
        let publisher = Arc::new(MockPublisher::new());

        let err = orchestrator(publisher.clone(), board.clone())
            .run(
                board.list().await,
                PublishMode::Live(CredentialPool::from_secrets(["A"]).working_copy()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Validation(msg) if msg.contains("Video one")));
        assert!(publisher.attempts().await.is_empty());
        assert_eq!(
            board.get("one").await.unwrap().state.publish_status,
            PublishStatus::None
        );
    }

    #[tokio::test]
    async fn test_simulation_mode_uses_simulator() {
        let board = board_with_completed(&["one"], true).await;
        let live = Arc::new(MockPublisher::new());
        let simulator = Arc::new(MockPublisher::new());
        let orchestrator = BatchPublishOrchestrator::new(live.clone(), simulator.clone(), board.clone());

        let report = orchestrator
            .run(board.list().await, PublishMode::Simulation)
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].credential_position, None);
        assert!(live.attempts().await.is_empty());
        assert_eq!(simulator.attempts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_item_restarted_after_snapshot_is_not_uploaded() {
        let board = board_with_completed(&["one", "two"], true).await;
        let snapshot = board.list().await;
        board
            .apply(ItemEvent::Started {
                item_id: "one".to_string(),
                started_at: Utc::now(),
                log: String::new(),
            })
            .await
            .unwrap();
        let publisher = Arc::new(MockPublisher::new());

        let report = orchestrator(publisher.clone(), board.clone())
            .run(snapshot, PublishMode::Live(CredentialPool::from_secrets(["K"]).working_copy()))
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item_id, "one");
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].item_id, "two");

        let attempts = publisher.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].item_id, "two");
        let item = board.get("one").await.unwrap();
        assert_eq!(item.state.status, ItemStatus::Processing);
        assert_eq!(item.state.publish_status, PublishStatus::None);
        assert!(item.state.publish_id.is_none());
    }

    #[tokio::test]
    async fn test_empty_selection_rejected() {
        let board = Arc::new(ItemBoard::new());
        let err = orchestrator(Arc::new(MockPublisher::new()), board)
            .run(Vec::new(), PublishMode::Simulation)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Validation(_)));
    }
}
