//! Mock generation backend for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::credentials::GenerationAuth;
use crate::generation::{CreateTaskRequest, GenerationBackend, GenerationError, RemoteTask};

/// A recorded create_task call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCreate {
    pub request: CreateTaskRequest,
    /// Pool position of the credential used.
    pub auth_position: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct MockTask {
    id: String,
    prompt: String,
    polls_seen: u32,
}

/// Mock implementation of the GenerationBackend trait.
///
/// By default every created task is listed with a downloadable artifact
/// after `ready_after_polls` listings (0 = immediately) and downloads
/// return a small payload. Behavior can be scripted:
/// - Fail the next create call, or every create whose prompt contains a marker
/// - Make listings fail (skipped polls) or return scripted records
/// - Keep tasks pending forever or report them as failed
/// - Serve specific (possibly empty) artifact payloads
///
/// # Example
///
/// ```rust,ignore
/// let backend = MockGenerationBackend::new();
/// backend.reject_prompts_containing("[reject]", 429, "quota").await;
/// backend.set_ready_after_polls(2).await;
/// ```
#[derive(Debug)]
pub struct MockGenerationBackend {
    creates: Arc<RwLock<Vec<RecordedCreate>>>,
    tasks: Arc<RwLock<Vec<MockTask>>>,
    next_create_error: Arc<RwLock<Option<GenerationError>>>,
    rejected_prompts: Arc<RwLock<Vec<(String, u16, String)>>>,
    failed_prompts: Arc<RwLock<Vec<(String, String)>>>,
    scripted_listings: Arc<RwLock<VecDeque<Vec<RemoteTask>>>>,
    listing_failures: Arc<RwLock<u32>>,
    list_calls: Arc<RwLock<u32>>,
    ready_after_polls: Arc<RwLock<u32>>,
    never_complete: Arc<RwLock<bool>>,
    artifacts: Arc<RwLock<HashMap<String, Bytes>>>,
    empty_downloads: Arc<RwLock<bool>>,
    task_counter: Arc<RwLock<u32>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            creates: Arc::new(RwLock::new(Vec::new())),
            tasks: Arc::new(RwLock::new(Vec::new())),
            next_create_error: Arc::new(RwLock::new(None)),
            rejected_prompts: Arc::new(RwLock::new(Vec::new())),
            failed_prompts: Arc::new(RwLock::new(Vec::new())),
            scripted_listings: Arc::new(RwLock::new(VecDeque::new())),
            listing_failures: Arc::new(RwLock::new(0)),
            list_calls: Arc::new(RwLock::new(0)),
            ready_after_polls: Arc::new(RwLock::new(0)),
            never_complete: Arc::new(RwLock::new(false)),
            artifacts: Arc::new(RwLock::new(HashMap::new())),
            empty_downloads: Arc::new(RwLock::new(false)),
            task_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Artifact URL the mock lists for a task.
    pub fn artifact_url_for(task_id: &str) -> String {
        format!("mock://artifacts/{}.mp4", task_id)
    }

    /// Get all recorded create_task calls.
    pub async fn create_calls(&self) -> Vec<RecordedCreate> {
        self.creates.read().await.clone()
    }

    pub async fn list_call_count(&self) -> u32 {
        *self.list_calls.read().await
    }

    /// Fail the next create_task call with `error`.
    pub async fn set_next_create_error(&self, error: GenerationError) {
        *self.next_create_error.write().await = Some(error);
    }

    /// Reject every create whose prompt contains `marker`.
    pub async fn reject_prompts_containing(&self, marker: &str, status: u16, body: &str) {
        self.rejected_prompts
            .write()
            .await
            .push((marker.to_string(), status, body.to_string()));
    }

    /// Report tasks whose prompt contains `marker` as failed in listings.
    pub async fn fail_tasks_containing(&self, marker: &str, reason: &str) {
        self.failed_prompts
            .write()
            .await
            .push((marker.to_string(), reason.to_string()));
    }

    /// Queue a listing returned verbatim by the next list_tasks call.
    pub async fn push_listing(&self, tasks: Vec<RemoteTask>) {
        self.scripted_listings.write().await.push_back(tasks);
    }

    /// Make the next `count` listings fail with a transport error.
    pub async fn fail_next_listings(&self, count: u32) {
        *self.listing_failures.write().await = count;
    }

    pub async fn set_ready_after_polls(&self, polls: u32) {
        *self.ready_after_polls.write().await = polls;
    }

    /// Keep every task pending forever.
    pub async fn set_never_complete(&self, never: bool) {
        *self.never_complete.write().await = never;
    }

    /// Serve `data` for `url`.
    pub async fn set_artifact(&self, url: &str, data: Bytes) {
        self.artifacts.write().await.insert(url.to_string(), data);
    }

    /// Make every generated artifact download return an empty body.
    pub async fn set_empty_downloads(&self, empty: bool) {
        *self.empty_downloads.write().await = empty;
    }

    async fn listing(&self) -> Vec<RemoteTask> {
        let ready_after = *self.ready_after_polls.read().await;
        let never = *self.never_complete.read().await;
        let failed = self.failed_prompts.read().await.clone();
        let mut tasks = self.tasks.write().await;

        tasks
            .iter_mut()
            .map(|task| {
                task.polls_seen += 1;
                let failure = failed
                    .iter()
                    .find(|(marker, _)| task.prompt.contains(marker.as_str()))
                    .map(|(_, reason)| reason.clone());
                let ready = !never && failure.is_none() && task.polls_seen > ready_after;
                RemoteTask {
                    id: Some(task.id.clone()),
                    prompt: Some(task.prompt.clone()),
                    created_at: Some(Utc::now().timestamp() as f64),
                    downloadable_url: ready.then(|| Self::artifact_url_for(&task.id)),
                    status: Some(
                        match (&failure, ready) {
                            (Some(_), _) => "failed",
                            (None, true) => "succeeded",
                            (None, false) => "processing",
                        }
                        .to_string(),
                    ),
                    failure_reason: failure,
                    ..Default::default()
                }
            })
            .collect()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_task(
        &self,
        request: &CreateTaskRequest,
        auth: &GenerationAuth,
    ) -> Result<String, GenerationError> {
        self.creates.write().await.push(RecordedCreate {
            request: request.clone(),
            auth_position: auth.position,
            timestamp: Utc::now(),
        });

        if let Some(error) = self.next_create_error.write().await.take() {
            return Err(error);
        }

        let rejected = self
            .rejected_prompts
            .read()
            .await
            .iter()
            .find(|(marker, _, _)| request.prompt.contains(marker.as_str()))
            .cloned();
        if let Some((_, status, body)) = rejected {
            return Err(GenerationError::Submission { status, body });
        }

        let id = {
            let mut counter = self.task_counter.write().await;
            *counter += 1;
            format!("task_{:04}", *counter)
        };
        self.tasks.write().await.push(MockTask {
            id: id.clone(),
            prompt: request.prompt.clone(),
            polls_seen: 0,
        });
        Ok(id)
    }

    async fn list_tasks(&self, _auth: &GenerationAuth) -> Result<Vec<RemoteTask>, GenerationError> {
        *self.list_calls.write().await += 1;

        {
            let mut failures = self.listing_failures.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(GenerationError::Transport("mock listing failure".to_string()));
            }
        }

        if let Some(scripted) = self.scripted_listings.write().await.pop_front() {
            return Ok(scripted);
        }

        Ok(self.listing().await)
    }

    async fn download(&self, url: &str) -> Result<Bytes, GenerationError> {
        if let Some(data) = self.artifacts.read().await.get(url) {
            return Ok(data.clone());
        }
        if url.starts_with("mock://artifacts/") {
            if *self.empty_downloads.read().await {
                return Ok(Bytes::new());
            }
            return Ok(Bytes::from(format!("mock video for {}", url)));
        }
        Err(GenerationError::Fetch(format!("HTTP 404 for {}", url)))
    }
}
