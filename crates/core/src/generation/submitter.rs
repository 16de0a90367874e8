//! Task submission.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{GenerationConfig, ProductionConfig};
use crate::content::DurationBucket;
use crate::credentials::GenerationAuth;
use crate::metrics;

use super::{CreateTaskRequest, GenerationBackend, GenerationError, TaskHandle};

/// Issues create-job requests and turns acceptances into [`TaskHandle`]s.
///
/// Has no local side effects: the caller records the outcome.
pub struct TaskSubmitter {
    backend: Arc<dyn GenerationBackend>,
    clock: Arc<dyn Clock>,
    config: GenerationConfig,
    backdate_secs: i64,
    error_body_max_chars: usize,
}

impl TaskSubmitter {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        clock: Arc<dyn Clock>,
        config: GenerationConfig,
        production: &ProductionConfig,
    ) -> Self {
        Self {
            backend,
            clock,
            config,
            backdate_secs: production.submit_backdate_secs,
            error_body_max_chars: production.error_body_max_chars,
        }
    }

    /// Submit one prompt.
    ///
    /// A non-2xx answer becomes [`GenerationError::Submission`] with the body
    /// cut to the configured length; network failures stay transport errors.
    pub async fn submit(
        &self,
        prompt: &str,
        duration: DurationBucket,
        auth: &GenerationAuth,
    ) -> Result<TaskHandle, GenerationError> {
        let request = CreateTaskRequest::video(prompt, duration, &self.config);
        let submitted_at = self.clock.now();

        match self.backend.create_task(&request, auth).await {
            Ok(task_id) => {
                metrics::SUBMISSIONS_TOTAL
                    .with_label_values(&["accepted"])
                    .inc();
                info!(
                    "Task {} accepted by {} backend (account {}, {} frames)",
                    task_id,
                    self.backend.name(),
                    auth.account_label(),
                    request.n_frames
                );
                Ok(TaskHandle {
                    task_id,
                    prompt: request.prompt,
                    submitted_at,
                    match_since: submitted_at.timestamp() - self.backdate_secs,
                })
            }
            Err(GenerationError::Submission { status, body }) => {
                metrics::SUBMISSIONS_TOTAL
                    .with_label_values(&["rejected"])
                    .inc();
                let body: String = body.chars().take(self.error_body_max_chars).collect();
                warn!("Task submission rejected ({}): {}", status, body);
                Err(GenerationError::Submission { status, body })
            }
            Err(e) => {
                metrics::SUBMISSIONS_TOTAL
                    .with_label_values(&["transport_error"])
                    .inc();
                warn!("Task submission failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClock, MockGenerationBackend};

    fn auth() -> GenerationAuth {
        GenerationAuth {
            authorization: "Bearer t".to_string(),
            sentinel_token: Some("sentinel".to_string()),
            position: 1,
        }
    }

    fn submitter(backend: Arc<MockGenerationBackend>, clock: Arc<MockClock>) -> TaskSubmitter {
        TaskSubmitter::new(
            backend,
            clock,
            GenerationConfig::default(),
            &ProductionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_submit_builds_handle() {
        let backend = Arc::new(MockGenerationBackend::new());
        let clock = Arc::new(MockClock::new());
        let submitter = submitter(backend.clone(), clock.clone());

        let handle = submitter
            .submit("neon alley in rain", DurationBucket::Short, &auth())
            .await
            .unwrap();

        assert!(!handle.task_id.is_empty());
        assert_eq!(handle.prompt, "neon alley in rain");
        assert_eq!(handle.submitted_at, clock.now());
        assert_eq!(handle.match_since, clock.now().timestamp() - 10);

        let calls = backend.create_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].request.n_frames, 300);
        assert_eq!(calls[0].auth_position, 1);
    }

    #[tokio::test]
    async fn test_rejection_truncates_body() {
        let backend = Arc::new(MockGenerationBackend::new());
        backend
            .set_next_create_error(GenerationError::Submission {
                status: 429,
                body: "x".repeat(200),
            })
            .await;
        let submitter = submitter(backend, Arc::new(MockClock::new()));

        let err = submitter
            .submit("p", DurationBucket::Long, &auth())
            .await
            .unwrap_err();
        match err {
            GenerationError::Submission { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body.len(), 50);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let backend = Arc::new(MockGenerationBackend::new());
        backend
            .set_next_create_error(GenerationError::Transport("reset".to_string()))
            .await;
        let submitter = submitter(backend, Arc::new(MockClock::new()));

        let err = submitter
            .submit("p", DurationBucket::Short, &auth())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
    }
}
