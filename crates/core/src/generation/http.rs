//! HTTP generation backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::credentials::GenerationAuth;
use crate::metrics;

use super::{CreateTaskRequest, GenerationBackend, GenerationError, RemoteTask, TaskListing};

const SERVICE: &str = "generation";

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Generation backend speaking the remote JSON API.
pub struct HttpGenerationBackend {
    client: Client,
    config: GenerationConfig,
}

impl HttpGenerationBackend {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| GenerationError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

fn transport(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Transport("request timed out".to_string())
    } else {
        GenerationError::Transport(e.to_string())
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn create_task(
        &self,
        request: &CreateTaskRequest,
        auth: &GenerationAuth,
    ) -> Result<String, GenerationError> {
        let started = Instant::now();
        let result = async {
            let response = self
                .client
                .post(self.url(&self.config.create_path))
                .header("accept", "*/*")
                .header("authorization", &auth.authorization)
                .header(
                    "openai-sentinel-token",
                    auth.sentinel_token.as_deref().unwrap_or(""),
                )
                .json(request)
                .send()
                .await
                .map_err(transport)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationError::Submission {
                    status: status.as_u16(),
                    body,
                });
            }

            let created: CreateTaskResponse = response
                .json()
                .await
                .map_err(|e| GenerationError::Malformed(e.to_string()))?;
            created
                .id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| GenerationError::Malformed("create response has no id".to_string()))
        }
        .await;

        metrics::observe_external(
            SERVICE,
            "create_task",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn list_tasks(&self, auth: &GenerationAuth) -> Result<Vec<RemoteTask>, GenerationError> {
        let started = Instant::now();
        let result = async {
            let response = self
                .client
                .get(self.url(&self.config.drafts_path))
                .header("authorization", &auth.authorization)
                .send()
                .await
                .map_err(transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(GenerationError::Transport(format!("listing returned HTTP {}", status)));
            }

            let listing: TaskListing = response
                .json()
                .await
                .map_err(|e| GenerationError::Malformed(e.to_string()))?;
            Ok(listing.into_tasks())
        }
        .await;

        metrics::observe_external(
            SERVICE,
            "list_tasks",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        if let Ok(tasks) = &result {
            debug!("Task listing returned {} records", tasks.len());
        }
        result
    }

    async fn download(&self, url: &str) -> Result<Bytes, GenerationError> {
        let started = Instant::now();
        let result = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| GenerationError::Fetch(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(GenerationError::Fetch(format!("HTTP {}", status)));
            }

            response
                .bytes()
                .await
                .map_err(|e| GenerationError::Fetch(e.to_string()))
        }
        .await;

        metrics::observe_external(
            SERVICE,
            "download",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = GenerationConfig {
            base_url: "https://gen.example.com/".to_string(),
            ..Default::default()
        };
        let backend = HttpGenerationBackend::new(config).unwrap();
        assert_eq!(
            backend.url("/backend/nf/create"),
            "https://gen.example.com/backend/nf/create"
        );
        assert_eq!(backend.name(), "http");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let config = GenerationConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let backend = HttpGenerationBackend::new(config).unwrap();
        let auth = GenerationAuth {
            authorization: "Bearer x".to_string(),
            sentinel_token: None,
            position: 0,
        };

        let result = backend.list_tasks(&auth).await;
        assert!(matches!(result, Err(GenerationError::Transport(_))));
    }
}
