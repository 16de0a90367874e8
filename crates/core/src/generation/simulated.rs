//! Offline generation backend for simulation mode.
//!
//! Exercises the same submit/poll/fetch path as the real backend with
//! randomized delays, `SIM-nnnnn` task ids and a canned artifact.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::credentials::GenerationAuth;

use super::{CreateTaskRequest, GenerationBackend, GenerationError, RemoteTask};

/// Payload served for every simulated artifact (an MP4 `ftyp` box).
pub const SIMULATED_ARTIFACT: &[u8] = &[
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2', 0x00, 0x00, 0x00,
    0x00, b'm', b'p', b'4', b'2', b'i', b's', b'o', b'm',
];

/// Drafts listed per poll, matching the real endpoint's `limit=15`.
pub const LISTING_LIMIT: usize = 15;

#[derive(Debug, Clone)]
struct SimulatedTask {
    seq: u64,
    prompt: String,
    created_at: DateTime<Utc>,
    ready_at: DateTime<Utc>,
}

/// Generation backend that never touches the network.
pub struct SimulatedGenerationBackend {
    config: SimulationConfig,
    clock: Arc<dyn Clock>,
    tasks: Mutex<HashMap<String, SimulatedTask>>,
    next_seq: AtomicU64,
}

impl SimulatedGenerationBackend {
    pub fn new(config: SimulationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            tasks: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    fn random_ms(min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn lock_tasks(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SimulatedTask>>, GenerationError> {
        self.tasks
            .lock()
            .map_err(|e| GenerationError::Transport(format!("simulated backend poisoned: {}", e)))
    }
}

#[async_trait]
impl GenerationBackend for SimulatedGenerationBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn create_task(
        &self,
        request: &CreateTaskRequest,
        _auth: &GenerationAuth,
    ) -> Result<String, GenerationError> {
        let submit_delay =
            Self::random_ms(self.config.submit_delay_min_ms, self.config.submit_delay_max_ms);
        self.clock.sleep(Duration::from_millis(submit_delay)).await;

        let render_delay =
            Self::random_ms(self.config.render_delay_min_ms, self.config.render_delay_max_ms);
        let now = self.clock.now();

        let mut tasks = self.lock_tasks()?;
        let task_id = loop {
            let candidate = format!("SIM-{}", rand::thread_rng().gen_range(0..100_000));
            if !tasks.contains_key(&candidate) {
                break candidate;
            }
        };
        tasks.insert(
            task_id.clone(),
            SimulatedTask {
                seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                prompt: request.prompt.clone(),
                created_at: now,
                ready_at: now + chrono::Duration::milliseconds(render_delay as i64),
            },
        );

        // Older drafts fall off the listing for good.
        if tasks.len() > LISTING_LIMIT {
            let mut seqs: Vec<u64> = tasks.values().map(|t| t.seq).collect();
            seqs.sort_unstable_by(|a, b| b.cmp(a));
            let cutoff = seqs[LISTING_LIMIT - 1];
            tasks.retain(|_, t| t.seq >= cutoff);
        }

        debug!(
            "Simulated task {} accepted, ready in {}ms",
            task_id, render_delay
        );
        Ok(task_id)
    }

    async fn list_tasks(&self, _auth: &GenerationAuth) -> Result<Vec<RemoteTask>, GenerationError> {
        let now = self.clock.now();
        let tasks = self.lock_tasks()?;

        let mut newest: Vec<_> = tasks.iter().collect();
        newest.sort_by(|a, b| b.1.seq.cmp(&a.1.seq));

        Ok(newest
            .into_iter()
            .take(LISTING_LIMIT)
            .map(|(id, task)| {
                let ready = task.ready_at <= now;
                RemoteTask {
                    id: Some(id.clone()),
                    prompt: Some(task.prompt.clone()),
                    created_at: Some(task.created_at.timestamp() as f64),
                    downloadable_url: ready.then(|| self.config.artifact_url.clone()),
                    status: Some(if ready { "succeeded" } else { "processing" }.to_string()),
                    ..Default::default()
                }
            })
            .collect())
    }

    async fn download(&self, url: &str) -> Result<Bytes, GenerationError> {
        debug!("Serving canned artifact for {}", url);
        Ok(Bytes::from_static(SIMULATED_ARTIFACT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::GenerationConfig;
    use crate::content::DurationBucket;
    use crate::testing::MockClock;

    fn fast_config() -> SimulationConfig {
        SimulationConfig {
            submit_delay_min_ms: 10,
            submit_delay_max_ms: 20,
            render_delay_min_ms: 50,
            render_delay_max_ms: 80,
            ..Default::default()
        }
    }

    fn auth() -> GenerationAuth {
        GenerationAuth {
            authorization: "Bearer sim".to_string(),
            sentinel_token: None,
            position: 0,
        }
    }

    #[tokio::test]
    async fn test_task_becomes_ready_after_render_delay() {
        let clock = Arc::new(MockClock::new());
        let backend = SimulatedGenerationBackend::new(fast_config(), clock.clone());
        let request =
            CreateTaskRequest::video("forest", DurationBucket::Short, &GenerationConfig::default());

        let task_id = backend.create_task(&request, &auth()).await.unwrap();
        assert!(task_id.starts_with("SIM-"));

        let listing = backend.list_tasks(&auth()).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id.as_deref(), Some(task_id.as_str()));
        assert!(listing[0].artifact_url().is_none());

        assert!(clock.elapsed() >= Duration::from_millis(10));
        clock.advance(Duration::from_millis(100));
        let listing = backend.list_tasks(&auth()).await.unwrap();
        assert!(listing[0].artifact_url().is_some());
    }

    #[tokio::test]
    async fn test_listing_keeps_only_newest_drafts() {
        let clock = Arc::new(MockClock::new());
        let backend = SimulatedGenerationBackend::new(fast_config(), clock.clone());
        let mut ids = Vec::new();
        for n in 0..(LISTING_LIMIT + 5) {
            let request = CreateTaskRequest::video(
                format!("scene {}", n),
                DurationBucket::Short,
                &GenerationConfig::default(),
            );
            ids.push(backend.create_task(&request, &auth()).await.unwrap());
        }

        let listing = backend.list_tasks(&auth()).await.unwrap();

        assert_eq!(listing.len(), LISTING_LIMIT);
        assert_eq!(listing[0].id.as_deref(), ids.last().map(String::as_str));
        assert!(listing.iter().all(|t| t.id.as_deref() != Some(ids[0].as_str())));
        assert_eq!(backend.lock_tasks().unwrap().len(), LISTING_LIMIT);
    }

    #[tokio::test]
    async fn test_download_returns_canned_payload() {
        let backend = SimulatedGenerationBackend::new(fast_config(), Arc::new(SystemClock));
        let bytes = backend.download("https://example/sample.mp4").await.unwrap();
        assert_eq!(bytes.as_ref(), SIMULATED_ARTIFACT);
    }

    #[test]
    fn test_random_ms_bounds() {
        assert_eq!(SimulatedGenerationBackend::random_ms(5, 5), 5);
        assert_eq!(SimulatedGenerationBackend::random_ms(9, 3), 9);
        let v = SimulatedGenerationBackend::random_ms(1, 3);
        assert!((1..=3).contains(&v));
    }
}
