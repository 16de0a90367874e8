//! Concurrent production batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{GenerationConfig, ProductionConfig, SimulationConfig};
use crate::content::DurationBucket;
use crate::credentials::GenerationAuth;
use crate::generation::{
    ArtifactFetcher, GenerationBackend, GenerationError, TaskMatcher, TaskPoller, TaskSubmitter,
};
use crate::item::{Artifact, ItemBoard, ItemEvent, WorkItem};
use crate::metrics;

use super::{ProductionError, ProductionMode, ProductionReport};

/// Submit, poll and fetch for a single item.
struct Pipeline {
    submitter: TaskSubmitter,
    poller: TaskPoller,
    fetcher: ArtifactFetcher,
    board: Arc<ItemBoard>,
    auth: GenerationAuth,
    duration: DurationBucket,
    simulation: bool,
}

impl Pipeline {
    async fn run(&self, item: &WorkItem) -> Result<Artifact, GenerationError> {
        let handle = self
            .submitter
            .submit(item.content.prompt(), self.duration, &self.auth)
            .await?;

        let log = if self.simulation {
            format!(
                "[simulation] task {} queued, rendering...",
                handle.task_id
            )
        } else {
            format!("Task submitted: {}, monitoring queue...", handle.task_id)
        };
        if let Err(e) = self
            .board
            .apply(ItemEvent::Submitted {
                item_id: item.id().to_string(),
                task_id: handle.task_id.clone(),
                log,
            })
            .await
        {
            warn!("Could not record submission for {}: {}", item.id(), e);
        }

        let url = self.poller.poll(&handle, &self.auth).await?;
        self.fetcher.fetch(&url).await
    }
}

/// Runs one production batch: every selected item gets its own pipeline
/// and all pipelines run concurrently.
///
/// Each pipeline ends in exactly one `completed` or `error` event for its
/// item. The batch returns only after every pipeline has reached that
/// point. Cancelling the orchestrator aborts in-flight pipelines and marks
/// their items as errored.
pub struct BatchProductionOrchestrator {
    board: Arc<ItemBoard>,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn GenerationBackend>,
    simulator: Arc<dyn GenerationBackend>,
    generation: GenerationConfig,
    production: ProductionConfig,
    simulation: SimulationConfig,
    cancel: CancellationToken,
}

impl BatchProductionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: Arc<ItemBoard>,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn GenerationBackend>,
        simulator: Arc<dyn GenerationBackend>,
        generation: GenerationConfig,
        production: ProductionConfig,
        simulation: SimulationConfig,
    ) -> Self {
        Self {
            board,
            clock,
            backend,
            simulator,
            generation,
            production,
            simulation,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort every in-flight pipeline. Subsequent batches are cancelled on
    /// start.
    pub fn shutdown(&self) {
        info!("Cancelling in-flight production pipelines");
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reject the batch before any item is touched.
    pub fn validate(items: &[WorkItem]) -> Result<(), ProductionError> {
        if items.is_empty() {
            return Err(ProductionError::Validation(
                "select at least one item to produce".to_string(),
            ));
        }
        if let Some(busy) = items.iter().find(|i| i.state.status.is_in_flight()) {
            return Err(ProductionError::Validation(format!(
                "\"{}\" is already in production",
                busy.content.title
            )));
        }
        Ok(())
    }

    fn pipeline(&self, mode: &ProductionMode, duration: DurationBucket) -> Pipeline {
        let (backend, auth, interval) = match mode {
            ProductionMode::Live(auth) => (
                self.backend.clone(),
                auth.clone(),
                Duration::from_secs(self.production.poll_interval_secs),
            ),
            ProductionMode::Simulation => (
                self.simulator.clone(),
                GenerationAuth {
                    authorization: "simulation".to_string(),
                    sentinel_token: None,
                    position: 0,
                },
                Duration::from_millis(self.simulation.poll_interval_ms),
            ),
        };

        let matcher = TaskMatcher::new(
            self.production.prompt_match_prefix_chars,
            self.production.strict_id_matching,
        );

        Pipeline {
            submitter: TaskSubmitter::new(
                backend.clone(),
                self.clock.clone(),
                self.generation.clone(),
                &self.production,
            ),
            poller: TaskPoller::new(
                backend.clone(),
                self.clock.clone(),
                matcher,
                interval,
                Duration::from_secs(self.production.timeout_secs),
            ),
            fetcher: ArtifactFetcher::new(backend, self.clock.clone()),
            board: self.board.clone(),
            auth,
            duration,
            simulation: mode.is_simulation(),
        }
    }

    /// Run one batch to completion.
    ///
    /// Only validation errors escape; per-item failures are recorded on the
    /// item log and in the report.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        mode: ProductionMode,
        duration: DurationBucket,
    ) -> Result<ProductionReport, ProductionError> {
        Self::validate(&items)?;

        metrics::PRODUCTION_BATCHES
            .with_label_values(&[mode.as_str()])
            .inc();
        info!(
            "Starting production of {} items ({} mode, {})",
            items.len(),
            mode.as_str(),
            duration.as_str()
        );

        // Every item shows as started before any network call is made.
        let started_at = self.clock.now();
        let start_log = match &mode {
            ProductionMode::Live(auth) => {
                format!("Connecting with account {}...", auth.account_label())
            }
            ProductionMode::Simulation => {
                "[simulation] connecting to virtual backend...".to_string()
            }
        };
        let mut started = Vec::with_capacity(items.len());
        for item in items {
            match self
                .board
                .apply(ItemEvent::Started {
                    item_id: item.id().to_string(),
                    started_at,
                    log: start_log.clone(),
                })
                .await
            {
                Ok(item) => started.push(item),
                Err(e) => warn!("Skipping {}: {}", item.id(), e),
            }
        }

        let pipeline = Arc::new(self.pipeline(&mode, duration));
        let mut pending: HashSet<String> = HashSet::new();
        let mut set = JoinSet::new();

        for item in started {
            pending.insert(item.id().to_string());
            let pipeline = pipeline.clone();
            let token = self.cancel.child_token();

            set.spawn(async move {
                let begun = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ProductionError::Cancelled),
                    result = pipeline.run(&item) => result.map_err(ProductionError::from),
                };
                let label = if outcome.is_ok() { "completed" } else { "failed" };
                metrics::PIPELINE_DURATION
                    .with_label_values(&[label])
                    .observe(begun.elapsed().as_secs_f64());

                let id = item.id().to_string();
                let event = match outcome {
                    Ok(artifact) => {
                        info!("Item {} produced ({} bytes)", id, artifact.size_bytes);
                        let log = if pipeline.simulation {
                            "[simulation] render complete".to_string()
                        } else {
                            "Render complete, video downloaded".to_string()
                        };
                        ItemEvent::Completed {
                            item_id: id.clone(),
                            artifact,
                            log,
                        }
                    }
                    Err(e) => {
                        error!("Production of {} failed: {}", id, e);
                        metrics::PIPELINE_FAILURES
                            .with_label_values(&[e.kind()])
                            .inc();
                        ItemEvent::Failed {
                            item_id: id.clone(),
                            log: format!("Error: {}", e),
                        }
                    }
                };
                let completed = matches!(event, ItemEvent::Completed { .. });
                if let Err(e) = pipeline.board.apply(event).await {
                    warn!("Could not record outcome for {}: {}", id, e);
                }
                (id, completed)
            });
        }

        let mut report = ProductionReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, completed)) => {
                    pending.remove(&id);
                    if completed {
                        report.completed.push(id);
                    } else {
                        report.failed.push(id);
                    }
                }
                Err(e) => error!("Production pipeline panicked: {}", e),
            }
        }

        // A panicked pipeline never emitted its terminal event.
        for id in pending {
            let reason = ProductionError::Aborted("pipeline terminated unexpectedly".to_string());
            if let Err(e) = self
                .board
                .apply(ItemEvent::Failed {
                    item_id: id.clone(),
                    log: format!("Error: {}", reason),
                })
                .await
            {
                debug!("Could not mark {} as failed: {}", id, e);
            }
            report.failed.push(id);
        }

        info!(
            "Production batch finished: {} completed, {} failed",
            report.completed.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentRecord;
    use crate::item::ItemStatus;
    use crate::testing::fixtures::{content_record, generation_auth};
    use crate::clock::SystemClock;
    use crate::testing::{MockClock, MockGenerationBackend};

    struct Harness {
        board: Arc<ItemBoard>,
        backend: Arc<MockGenerationBackend>,
        simulator: Arc<MockGenerationBackend>,
        orchestrator: BatchProductionOrchestrator,
    }

    async fn harness(records: Vec<ContentRecord>) -> Harness {
        let board = Arc::new(ItemBoard::new());
        board.replace_all(records).await;
        let backend = Arc::new(MockGenerationBackend::new());
        let simulator = Arc::new(MockGenerationBackend::new());
        let orchestrator = BatchProductionOrchestrator::new(
            board.clone(),
            Arc::new(MockClock::new()),
            backend.clone(),
            simulator.clone(),
            GenerationConfig::default(),
            ProductionConfig::default(),
            SimulationConfig::default(),
        );
        Harness {
            board,
            backend,
            simulator,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_batch_completes_every_item() {
        let h = harness(vec![content_record("a", "Alpha"), content_record("b", "Beta")]).await;
        let mut events = h.board.subscribe();

        let report = h
            .orchestrator
            .run(
                h.board.list().await,
                ProductionMode::Live(generation_auth(1)),
                DurationBucket::Long,
            )
            .await
            .unwrap();

        assert_eq!(report.completed.len(), 2);
        assert!(report.failed.is_empty());
        for id in ["a", "b"] {
            let item = h.board.get(id).await.unwrap();
            assert_eq!(item.state.status, ItemStatus::Completed);
            assert!(item.state.artifact.is_some());
            assert!(item.state.task_id.is_some());
        }

        let mut start_logs = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ItemEvent::Started { log, .. } = event {
                start_logs.push(log);
            }
        }
        assert_eq!(start_logs.len(), 2);
        assert!(start_logs.iter().all(|l| l.contains("account #2")));

        let calls = h.backend.create_calls().await;
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.request.n_frames == 450 && c.auth_position == 1));
        assert!(h.simulator.create_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_siblings() {
        let h = harness(vec![
            content_record("a", "Alpha"),
            content_record("b", "[reject] Beta"),
            content_record("c", "Gamma"),
        ])
        .await;
        h.backend
            .reject_prompts_containing("[reject]", 429, "rate limited")
            .await;

        let report = h
            .orchestrator
            .run(
                h.board.list().await,
                ProductionMode::Live(generation_auth(0)),
                DurationBucket::Short,
            )
            .await
            .unwrap();

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.failed, vec!["b".to_string()]);

        let failed = h.board.get("b").await.unwrap();
        assert_eq!(failed.state.status, ItemStatus::Error);
        assert!(failed.state.progress_log.contains("Error:"));
        assert!(failed.state.progress_log.contains("429"));
        assert!(failed.state.artifact.is_none());
        assert!(
            metrics::PIPELINE_FAILURES
                .with_label_values(&["submission"])
                .get()
                >= 1
        );

        assert_eq!(
            h.board.get("c").await.unwrap().state.status,
            ItemStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_simulation_uses_simulated_backend() {
        let h = harness(vec![content_record("a", "Alpha")]).await;

        let report = h
            .orchestrator
            .run(
                h.board.list().await,
                ProductionMode::Simulation,
                DurationBucket::Short,
            )
            .await
            .unwrap();

        assert_eq!(report.completed, vec!["a".to_string()]);
        assert!(h.backend.create_calls().await.is_empty());
        assert_eq!(h.simulator.create_calls().await.len(), 1);
        let item = h.board.get("a").await.unwrap();
        assert!(item.state.progress_log.contains("[simulation]"));
    }

    #[tokio::test]
    async fn test_in_flight_item_rejects_batch() {
        let h = harness(vec![content_record("a", "Alpha")]).await;
        h.board
            .apply(ItemEvent::Started {
                item_id: "a".to_string(),
                started_at: chrono::Utc::now(),
                log: String::new(),
            })
            .await
            .unwrap();

        let err = h
            .orchestrator
            .run(
                h.board.list().await,
                ProductionMode::Simulation,
                DurationBucket::Short,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProductionError::Validation(_)));
        assert!(h.simulator.create_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pipelines() {
        let h = harness(vec![content_record("a", "Alpha")]).await;
        h.orchestrator.shutdown();
        assert!(h.orchestrator.is_shut_down());

        let report = h
            .orchestrator
            .run(
                h.board.list().await,
                ProductionMode::Simulation,
                DurationBucket::Short,
            )
            .await
            .unwrap();

        assert_eq!(report.failed, vec!["a".to_string()]);
        let item = h.board.get("a").await.unwrap();
        assert_eq!(item.state.status, ItemStatus::Error);
        assert!(item.state.progress_log.contains("production cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_waiting_between_polls() {
        let board = Arc::new(ItemBoard::new());
        board.replace_all(vec![content_record("a", "Alpha")]).await;
        let backend = Arc::new(MockGenerationBackend::new());
        backend.set_never_complete(true).await;
        let orchestrator = BatchProductionOrchestrator::new(
            board.clone(),
            Arc::new(SystemClock),
            backend.clone(),
            Arc::new(MockGenerationBackend::new()),
            GenerationConfig::default(),
            ProductionConfig::default(),
            SimulationConfig::default(),
        );

        let run = orchestrator.run(
            board.list().await,
            ProductionMode::Live(generation_auth(0)),
            DurationBucket::Short,
        );
        let stop = async {
            while board.get("a").await.map(|i| i.state.status) != Some(ItemStatus::Monitoring) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            orchestrator.shutdown();
        };
        let (report, ()) = tokio::join!(run, stop);

        let report = tokio_test::assert_ok!(report);
        assert_eq!(report.failed, vec!["a".to_string()]);
        let item = board.get("a").await.unwrap();
        assert_eq!(item.state.status, ItemStatus::Error);
        assert!(item.state.progress_log.contains("production cancelled"));
        assert!(item.state.artifact.is_none());
    }

    #[tokio::test]
    async fn test_empty_selection_rejected() {
        let h = harness(Vec::new()).await;
        let err = h
            .orchestrator
            .run(Vec::new(), ProductionMode::Simulation, DurationBucket::Short)
            .await
            .unwrap_err();
        assert!(matches!(err, ProductionError::Validation(_)));
    }
}
