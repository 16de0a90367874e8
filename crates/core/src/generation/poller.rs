//! Task status polling.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::credentials::GenerationAuth;
use crate::metrics;

use super::{GenerationBackend, GenerationError, RemoteTask, TaskHandle};

/// Finds the listing record that belongs to a submitted task.
///
/// An exact id match always wins. Unless strict, a record also matches when
/// it was created no earlier than the handle's `match_since` and its prompt
/// contains the first `prefix_chars` characters of the submitted prompt.
/// The fallback can pick the wrong record when two near-simultaneous jobs
/// share a prompt prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskMatcher {
    prefix_chars: usize,
    strict: bool,
}

impl TaskMatcher {
    pub fn new(prefix_chars: usize, strict: bool) -> Self {
        Self {
            prefix_chars,
            strict,
        }
    }

    /// Exact id matching only.
    pub fn strict() -> Self {
        Self::new(0, true)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn matches_id(handle: &TaskHandle, task: &RemoteTask) -> bool {
        task.id.as_deref() == Some(handle.task_id.as_str())
    }

    fn matches_fallback(&self, handle: &TaskHandle, task: &RemoteTask) -> bool {
        if self.strict {
            return false;
        }
        let recent = task
            .created_at
            .map(|ts| ts >= handle.match_since as f64)
            .unwrap_or(false);
        if !recent {
            return false;
        }
        let prefix: String = handle.prompt.chars().take(self.prefix_chars).collect();
        task.prompt
            .as_deref()
            .map(|p| p.contains(prefix.as_str()))
            .unwrap_or(false)
    }

    pub fn matches(&self, handle: &TaskHandle, task: &RemoteTask) -> bool {
        Self::matches_id(handle, task) || self.matches_fallback(handle, task)
    }

    /// Pick the record for `handle`, preferring an id match.
    pub fn find<'a>(&self, handle: &TaskHandle, tasks: &'a [RemoteTask]) -> Option<&'a RemoteTask> {
        tasks
            .iter()
            .find(|t| Self::matches_id(handle, t))
            .or_else(|| tasks.iter().find(|t| self.matches_fallback(handle, t)))
    }
}

/// Follows one task until an artifact reference appears, the backend
/// reports failure, or the timeout ceiling passes.
///
/// The deadline is checked at the start of every iteration against the
/// injected [`Clock`]. A failed poll is skipped, never fatal.
pub struct TaskPoller {
    backend: Arc<dyn GenerationBackend>,
    clock: Arc<dyn Clock>,
    matcher: TaskMatcher,
    interval: Duration,
    timeout: Duration,
}

impl TaskPoller {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        clock: Arc<dyn Clock>,
        matcher: TaskMatcher,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            clock,
            matcher,
            interval,
            timeout,
        }
    }

    /// Poll until the task resolves. Returns the artifact reference.
    pub async fn poll(
        &self,
        handle: &TaskHandle,
        auth: &GenerationAuth,
    ) -> Result<String, GenerationError> {
        let timeout = chrono::Duration::from_std(self.timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1000));
        let mut attempt: u32 = 0;

        loop {
            let elapsed = self.clock.now() - handle.submitted_at;
            if elapsed > timeout {
                metrics::POLL_TIMEOUTS.inc();
                warn!(
                    "Task {} timed out after {}s ({} polls)",
                    handle.task_id,
                    elapsed.num_seconds(),
                    attempt
                );
                return Err(GenerationError::PollTimeout {
                    task_id: handle.task_id.clone(),
                    elapsed_secs: elapsed.num_seconds(),
                });
            }

            attempt += 1;
            match self.backend.list_tasks(auth).await {
                Ok(tasks) => match self.matcher.find(handle, &tasks) {
                    Some(task) => {
                        if let Some(reason) = task.failure() {
                            metrics::POLL_ATTEMPTS_TOTAL
                                .with_label_values(&["failed"])
                                .inc();
                            return Err(GenerationError::TaskFailed {
                                task_id: handle.task_id.clone(),
                                reason,
                            });
                        }
                        if let Some(url) = task.artifact_url() {
                            metrics::POLL_ATTEMPTS_TOTAL
                                .with_label_values(&["matched"])
                                .inc();
                            info!(
                                "Task {} ready after {} polls",
                                handle.task_id, attempt
                            );
                            return Ok(url.to_string());
                        }
                        metrics::POLL_ATTEMPTS_TOTAL
                            .with_label_values(&["pending"])
                            .inc();
                        debug!("Task {} matched but still rendering", handle.task_id);
                    }
                    None => {
                        metrics::POLL_ATTEMPTS_TOTAL
                            .with_label_values(&["pending"])
                            .inc();
                        debug!(
                            "Task {} not in listing yet (poll {})",
                            handle.task_id, attempt
                        );
                    }
                },
                Err(e) => {
                    metrics::POLL_ATTEMPTS_TOTAL
                        .with_label_values(&["skipped"])
                        .inc();
                    warn!(
                        "Poll {} for task {} failed, retrying: {}",
                        attempt, handle.task_id, e
                    );
                }
            }

            self.clock.sleep(self.interval).await;
        }
    }
}
