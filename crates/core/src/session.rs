//! One working session: the current batch, the selection, the credential
//! settings, and the entry points for production and publishing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::content::{
    assign_missing_ids, ContentError, ContentProvider, ContentRecord, ContentRequest,
    DurationBucket,
};
use crate::credentials::{
    CredentialEntry, CredentialError, CredentialKind, CredentialSettings, CredentialStore,
    GenerationAuth,
};
use crate::generation::{
    GenerationBackend, GenerationError, HttpGenerationBackend, SimulatedGenerationBackend,
};
use crate::item::{ArtifactExport, ItemBoard, ItemError, ItemEvent, WorkItem};
use crate::production::{
    BatchProductionOrchestrator, ProductionError, ProductionMode, ProductionReport,
};
use crate::publishing::{
    BatchPublishOrchestrator, HttpPublisher, PublishError, PublishMode, PublishReport, Publisher,
    SimulatedPublisher, SmartScheduler,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Item(#[from] ItemError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Production(#[from] ProductionError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl SessionError {
    /// Pre-flight failure caused by the request rather than the system.
    pub fn is_validation(&self) -> bool {
        match self {
            SessionError::Validation(_) => true,
            SessionError::Content(ContentError::InvalidRequest(_)) => true,
            SessionError::Credential(e) => !matches!(e, CredentialError::Store(_)),
            SessionError::Production(ProductionError::Validation(_)) => true,
            SessionError::Production(ProductionError::Credential(_)) => true,
            SessionError::Publish(PublishError::Validation(_)) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SessionError::NotFound(_) | SessionError::Item(ItemError::NotFound(_))
        )
    }
}

/// Batch-level notifications.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ProductionFinished { report: ProductionReport },
    PublishFinished { report: PublishReport },
}

/// The four remote boundaries a session talks to.
pub struct SessionBackends {
    pub generation: Arc<dyn GenerationBackend>,
    pub simulated_generation: Arc<dyn GenerationBackend>,
    pub publisher: Arc<dyn Publisher>,
    pub simulated_publisher: Arc<dyn Publisher>,
}

impl SessionBackends {
    /// HTTP backends plus their simulated counterparts.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, SessionError> {
        Ok(Self {
            generation: Arc::new(HttpGenerationBackend::new(config.generation.clone())?),
            simulated_generation: Arc::new(SimulatedGenerationBackend::new(
                config.simulation.clone(),
                clock.clone(),
            )),
            publisher: Arc::new(HttpPublisher::new(config.publishing.clone())?),
            simulated_publisher: Arc::new(SimulatedPublisher::new(
                Duration::from_millis(config.simulation.upload_delay_ms),
                clock,
            )),
        })
    }
}

/// A validated production batch, ready to run.
#[derive(Debug, Clone)]
pub struct ProductionPlan {
    pub items: Vec<WorkItem>,
    pub mode: ProductionMode,
    pub duration: DurationBucket,
}

pub struct Session {
    board: Arc<ItemBoard>,
    selection: RwLock<HashSet<String>>,
    duration: RwLock<DurationBucket>,
    settings: RwLock<CredentialSettings>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    production: BatchProductionOrchestrator,
    publishing: BatchPublishOrchestrator,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Build a session, loading persisted credential settings from `store`.
    pub fn new(
        config: &Config,
        backends: SessionBackends,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let settings = store.load()?;
        info!(
            "Loaded settings: {} generation credentials, {} publishing credentials, simulation {}",
            settings.generation.len(),
            settings.publishing.len(),
            if settings.use_simulation { "on" } else { "off" }
        );

        let board = Arc::new(ItemBoard::new());
        let production = BatchProductionOrchestrator::new(
            board.clone(),
            clock.clone(),
            backends.generation,
            backends.simulated_generation,
            config.generation.clone(),
            config.production.clone(),
            config.simulation.clone(),
        );
        let publishing = BatchPublishOrchestrator::new(
            backends.publisher,
            backends.simulated_publisher,
            board.clone(),
        );
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            board,
            selection: RwLock::new(HashSet::new()),
            duration: RwLock::new(DurationBucket::default()),
            settings: RwLock::new(settings),
            store,
            clock,
            production,
            publishing,
            events,
        })
    }

    pub fn board(&self) -> Arc<ItemBoard> {
        self.board.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---------------------------------------------------------------------
    // Batch contents
    // ---------------------------------------------------------------------

    /// Ask the provider for a fresh batch. On failure the current batch is
    /// left untouched.
    pub async fn generate_items(
        &self,
        provider: &dyn ContentProvider,
        request: ContentRequest,
    ) -> Result<Vec<WorkItem>, SessionError> {
        request.validate()?;
        info!(
            "Requesting {} scripts from {} ({})",
            request.count,
            provider.name(),
            request.duration.as_str()
        );
        let records = provider.generate(&request).await?;
        if records.is_empty() {
            return Err(ContentError::Malformed("provider returned no records".to_string()).into());
        }
        *self.duration.write().await = request.duration;
        self.load_items(records).await;
        Ok(self.board.list().await)
    }

    /// Replace the batch with `records` and select all of them.
    pub async fn load_items(&self, mut records: Vec<ContentRecord>) -> usize {
        assign_missing_ids(&mut records);
        let ids: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
        let count = self.board.replace_all(records).await;
        *self.selection.write().await = ids;
        info!("Loaded batch of {} items", count);
        count
    }

    pub async fn items(&self) -> Vec<WorkItem> {
        self.board.list().await
    }

    pub async fn edit_content(&self, content: ContentRecord) -> Result<WorkItem, SessionError> {
        Ok(self
            .board
            .apply(ItemEvent::ContentEdited {
                item_id: content.id.clone(),
                content,
            })
            .await?)
    }

    /// The produced video of one item and its notes sidecar.
    pub async fn export_artifact(&self, item_id: &str) -> Result<ArtifactExport, SessionError> {
        let item = self
            .board
            .get(item_id)
            .await
            .ok_or_else(|| SessionError::NotFound(item_id.to_string()))?;
        Ok(ArtifactExport::from_item(&item)?)
    }

    /// Set or clear the target publish instant of one item.
    pub async fn set_publish_time(
        &self,
        item_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<WorkItem, SessionError> {
        Ok(self
            .board
            .apply(ItemEvent::Scheduled {
                item_id: item_id.to_string(),
                at,
            })
            .await?)
    }

    pub async fn duration(&self) -> DurationBucket {
        *self.duration.read().await
    }

    pub async fn set_duration(&self, duration: DurationBucket) {
        *self.duration.write().await = duration;
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    pub async fn select(&self, item_id: &str) -> Result<(), SessionError> {
        if !self.board.contains(item_id).await {
            return Err(SessionError::NotFound(item_id.to_string()));
        }
        self.selection.write().await.insert(item_id.to_string());
        Ok(())
    }

    pub async fn deselect(&self, item_id: &str) {
        self.selection.write().await.remove(item_id);
    }

    /// Replace the selection. Unknown ids reject the whole update.
    pub async fn set_selection(&self, ids: &[String]) -> Result<(), SessionError> {
        for id in ids {
            if !self.board.contains(id).await {
                return Err(SessionError::NotFound(id.clone()));
            }
        }
        *self.selection.write().await = ids.iter().cloned().collect();
        Ok(())
    }

    /// Selected ids in batch order.
    pub async fn selection(&self) -> Vec<String> {
        self.selected_items()
            .await
            .into_iter()
            .map(|i| i.id().to_string())
            .collect()
    }

    pub async fn selected_items(&self) -> Vec<WorkItem> {
        let ids: Vec<String> = self.selection.read().await.iter().cloned().collect();
        self.board.select(&ids).await
    }

    async fn selected_completed(&self) -> Vec<WorkItem> {
        self.selected_items()
            .await
            .into_iter()
            .filter(WorkItem::is_publishable)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Production
    // ---------------------------------------------------------------------

    /// Validate a production batch without starting it.
    pub async fn prepare_production(&self) -> Result<ProductionPlan, SessionError> {
        let items = self.selected_items().await;
        if items.is_empty() {
            return Err(SessionError::Validation(
                "select at least one item to produce".to_string(),
            ));
        }
        BatchProductionOrchestrator::validate(&items)?;

        let mode = {
            let settings = self.settings.read().await;
            if settings.use_simulation {
                ProductionMode::Simulation
            } else {
                let entry = settings
                    .generation
                    .active()
                    .ok_or(CredentialError::NotConfigured(CredentialKind::Generation))?;
                ProductionMode::Live(GenerationAuth::from_entry(&entry)?)
            }
        };

        Ok(ProductionPlan {
            items,
            mode,
            duration: self.duration().await,
        })
    }

    /// Run a prepared batch to completion and announce the result.
    pub async fn run_production(
        &self,
        plan: ProductionPlan,
    ) -> Result<ProductionReport, SessionError> {
        let report = self
            .production
            .run(plan.items, plan.mode, plan.duration)
            .await?;
        let _ = self.events.send(SessionEvent::ProductionFinished {
            report: report.clone(),
        });
        Ok(report)
    }

    pub async fn produce(&self) -> Result<ProductionReport, SessionError> {
        let plan = self.prepare_production().await?;
        self.run_production(plan).await
    }

    // ---------------------------------------------------------------------
    // Publishing
    // ---------------------------------------------------------------------

    /// Give every selected completed item an evenly spaced target instant.
    pub async fn apply_smart_schedule(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, DateTime<Utc>)>, SessionError> {
        let eligible = self.selected_completed().await;
        if eligible.is_empty() {
            return Err(SessionError::Validation(
                "select at least one completed video to schedule".to_string(),
            ));
        }

        let slots = SmartScheduler::schedule(&eligible, now);
        for (item_id, at) in &slots {
            self.board
                .apply(ItemEvent::Scheduled {
                    item_id: item_id.clone(),
                    at: Some(*at),
                })
                .await?;
        }
        info!("Scheduled {} items starting {}", slots.len(), slots[0].1);
        Ok(slots)
    }

    /// Publish the selected completed items.
    ///
    /// Live batches work on a copy of the publishing pool; the persisted
    /// pool is never changed by rotation.
    pub async fn publish(&self) -> Result<PublishReport, SessionError> {
        let items = self.selected_completed().await;
        if items.is_empty() {
            return Err(SessionError::Validation(
                "select at least one completed video to publish".to_string(),
            ));
        }
        BatchPublishOrchestrator::validate(&items)?;

        let mode = {
            let settings = self.settings.read().await;
            if settings.use_simulation {
                PublishMode::Simulation
            } else if settings.publishing.is_empty() {
                return Err(CredentialError::NotConfigured(CredentialKind::Publishing).into());
            } else {
                PublishMode::Live(settings.publishing.working_copy())
            }
        };

        let report = self.publishing.run(items, mode).await?;
        let _ = self.events.send(SessionEvent::PublishFinished {
            report: report.clone(),
        });
        Ok(report)
    }

    // ---------------------------------------------------------------------
    // Credentials and settings
    // ---------------------------------------------------------------------

    pub async fn credentials(&self, kind: CredentialKind) -> Vec<CredentialEntry> {
        self.settings.read().await.pool(kind).entries()
    }

    pub async fn active_credential(&self, kind: CredentialKind) -> Option<CredentialEntry> {
        self.settings.read().await.pool(kind).active()
    }

    pub async fn add_credential(
        &self,
        kind: CredentialKind,
        secret: &str,
    ) -> Result<CredentialEntry, SessionError> {
        if kind == CredentialKind::Generation {
            // Reject curl text we could never build headers from.
            GenerationAuth::from_entry(&CredentialEntry::new(0, secret))?;
        }
        let entry = self.settings.write().await.pool_mut(kind).add(secret)?;
        info!("Added {} credential {}", kind.as_str(), entry.redacted());
        Ok(entry)
    }

    pub async fn remove_credential(
        &self,
        kind: CredentialKind,
        index: usize,
    ) -> Result<CredentialEntry, SessionError> {
        let entry = self.settings.write().await.pool_mut(kind).remove(index)?;
        info!("Removed {} credential {}", kind.as_str(), entry.redacted());
        Ok(entry)
    }

    /// Choose the credential used by the next production batch.
    pub async fn select_credential(
        &self,
        kind: CredentialKind,
        index: usize,
    ) -> Result<(), SessionError> {
        self.settings.write().await.pool_mut(kind).select(index)?;
        Ok(())
    }

    pub async fn use_simulation(&self) -> bool {
        self.settings.read().await.use_simulation
    }

    pub async fn set_simulation(&self, enabled: bool) {
        self.settings.write().await.use_simulation = enabled;
        info!("Simulation mode {}", if enabled { "enabled" } else { "disabled" });
    }

    pub async fn settings(&self) -> CredentialSettings {
        self.settings.read().await.clone()
    }

    /// Persist the current settings.
    pub async fn save_settings(&self) -> Result<(), SessionError> {
        let settings = self.settings.read().await.clone();
        self.store.save(&settings)?;
        info!("Settings saved");
        Ok(())
    }

    /// Cancel in-flight production pipelines.
    pub fn shutdown(&self) {
        warn!("Session shutting down");
        self.production.shutdown();
    }
}
