//! Shared, event-applied collection of work items.

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::content::ContentRecord;

use super::types::{
    ItemError, ItemEvent, ItemStatus, OrchestrationState, PublishStatus, WorkItem,
};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Collection of work items for one session.
///
/// Pipelines never touch items directly: they send [`ItemEvent`]s which are
/// validated against the current state and then applied. Every applied event
/// is rebroadcast to subscribers.
pub struct ItemBoard {
    items: RwLock<Vec<WorkItem>>,
    events: broadcast::Sender<ItemEvent>,
}

impl Default for ItemBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemBoard {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            items: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Subscribe to applied events.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemEvent> {
        self.events.subscribe()
    }

    /// Swap the whole batch for fresh items built from `records`.
    pub async fn replace_all(&self, records: Vec<ContentRecord>) -> usize {
        let fresh: Vec<WorkItem> = records.into_iter().map(WorkItem::new).collect();
        let count = fresh.len();
        *self.items.write().await = fresh;
        self.publish(ItemEvent::BatchLoaded { count });
        count
    }

    pub async fn list(&self) -> Vec<WorkItem> {
        self.items.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<WorkItem> {
        self.items.read().await.iter().find(|i| i.id() == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.items.read().await.iter().any(|i| i.id() == id)
    }

    /// Snapshot of the items whose ids are in `ids`, in board order.
    pub async fn select(&self, ids: &[String]) -> Vec<WorkItem> {
        self.items
            .read()
            .await
            .iter()
            .filter(|i| ids.iter().any(|id| id == i.id()))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Validate and apply one event, returning the updated item.
    ///
    /// Illegal transitions are rejected and leave the item untouched.
    pub async fn apply(&self, event: ItemEvent) -> Result<WorkItem, ItemError> {
        let Some(item_id) = event.item_id().map(str::to_string) else {
            return Err(ItemError::NotFound("<batch>".to_string()));
        };

        let updated = {
            let mut items = self.items.write().await;
            let item = items
                .iter_mut()
                .find(|i| i.id() == item_id)
                .ok_or_else(|| ItemError::NotFound(item_id.clone()))?;

            if !transition(item, &event) {
                let e = invalid(item, &event);
                warn!("Rejected item event: {}", e);
                return Err(e);
            }
            item.clone()
        };

        debug!(
            item_id = %item_id,
            event = event.kind(),
            status = updated.state.status.as_str(),
            "Applied item event"
        );
        self.publish(event);
        Ok(updated)
    }

    fn publish(&self, event: ItemEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn invalid(item: &WorkItem, event: &ItemEvent) -> ItemError {
    ItemError::InvalidTransition {
        item_id: item.id().to_string(),
        from: format!(
            "{}/{}",
            item.state.status.as_str(),
            item.state.publish_status.as_str()
        ),
        event: event.kind(),
    }
}

/// Apply `event` to `item` if the transition is legal. Returns whether it was applied.
fn transition(item: &mut WorkItem, event: &ItemEvent) -> bool {
    let state = &mut item.state;
    match event {
        ItemEvent::BatchLoaded { .. } => return false,

        ItemEvent::Started {
            started_at, log, ..
        } => {
            if state.status.is_in_flight() || state.publish_status == PublishStatus::Uploading {
                return false;
            }
            *state = OrchestrationState {
                status: ItemStatus::Processing,
                progress_log: log.clone(),
                started_at: Some(*started_at),
                scheduled_at: state.scheduled_at,
                ..OrchestrationState::default()
            };
        }

        ItemEvent::Submitted { task_id, log, .. } => {
            if state.status != ItemStatus::Processing {
                return false;
            }
            state.status = ItemStatus::Monitoring;
            state.task_id = Some(task_id.clone());
            state.progress_log = log.clone();
        }

        ItemEvent::Completed { artifact, log, .. } => {
            if state.status != ItemStatus::Monitoring || state.artifact.is_some() {
                return false;
            }
            state.status = ItemStatus::Completed;
            state.artifact = Some(artifact.clone());
            state.progress_log = log.clone();
        }

        ItemEvent::Failed { log, .. } => {
            if !state.status.is_in_flight() {
                return false;
            }
            state.status = ItemStatus::Error;
            state.progress_log = log.clone();
        }

        ItemEvent::ContentEdited { content, .. } => {
            if state.status.is_in_flight() || content.id != item.content.id {
                return false;
            }
            item.content = content.clone();
        }

        ItemEvent::Scheduled { at, .. } => {
            state.scheduled_at = *at;
        }

        ItemEvent::PublishStarted { .. } => {
            if state.status != ItemStatus::Completed
                || state.publish_status == PublishStatus::Uploading
            {
                return false;
            }
            state.publish_status = PublishStatus::Uploading;
            state.publish_id = None;
        }

        ItemEvent::Published { publish_id, .. } => {
            if state.publish_status != PublishStatus::Uploading {
                return false;
            }
            state.publish_status = PublishStatus::Success;
            state.publish_id = Some(publish_id.clone());
        }

        ItemEvent::PublishFailed { .. } => {
            if state.publish_status != PublishStatus::Uploading {
                return false;
            }
            state.publish_status = PublishStatus::Failed;
            state.publish_id = None;
        }
    }
    true
}
