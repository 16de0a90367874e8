//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real session whose remote boundaries are mocks, enabling
//! end-to-end API tests without network access.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::body::Bytes;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use reelpilot_core::{
    config::DatabaseConfig,
    testing::{MockClock, MockGenerationBackend, MockPublisher},
    Config, Session, SessionBackends, SqliteCredentialStore,
};

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use reelpilot_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Generation backend, live and simulated (MockGenerationBackend)
/// - Publishing backend, live and simulated (MockPublisher)
/// - Time (MockClock)
#[allow(dead_code)]
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The session behind the router
    pub session: Arc<Session>,
    pub backend: Arc<MockGenerationBackend>,
    pub simulated_backend: Arc<MockGenerationBackend>,
    pub publisher: Arc<MockPublisher>,
    pub simulated_publisher: Arc<MockPublisher>,
    /// Temporary directory for the settings database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[allow(dead_code)]
impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            ..Default::default()
        };

        let backend = Arc::new(MockGenerationBackend::new());
        let simulated_backend = Arc::new(MockGenerationBackend::new());
        let publisher = Arc::new(MockPublisher::new());
        let simulated_publisher = Arc::new(MockPublisher::new());
        let store = Arc::new(
            SqliteCredentialStore::new(&db_path).expect("Failed to create settings store"),
        );

        let session = Arc::new(
            Session::new(
                &config,
                SessionBackends {
                    generation: backend.clone(),
                    simulated_generation: simulated_backend.clone(),
                    publisher: publisher.clone(),
                    simulated_publisher: simulated_publisher.clone(),
                },
                store,
                Arc::new(MockClock::new()),
            )
            .expect("Failed to create session"),
        );

        let ws_broadcaster = reelpilot_server::api::WsBroadcaster::default();
        ws_broadcaster.forward(&session);

        let state = Arc::new(reelpilot_server::state::AppState::new(
            config,
            Arc::clone(&session),
            ws_broadcaster,
        ));
        let router = reelpilot_server::api::create_router(state);

        Self {
            router,
            session,
            backend,
            simulated_backend,
            publisher,
            simulated_publisher,
            temp_dir,
        }
    }

    /// Load `count` items titled "Clip 0".."Clip N" through the API.
    pub async fn load_items(&self, count: usize) -> Vec<String> {
        let items: Vec<Value> = (0..count)
            .map(|n| {
                serde_json::json!({
                    "id": format!("item-{}", n),
                    "title": format!("Clip {}", n),
                    "visualPrompt": format!("Cinematic wide shot of clip {}", n),
                    "description": "A short clip",
                    "tags": ["shorts"]
                })
            })
            .collect();
        let response = self
            .post("/api/v1/items", serde_json::json!({ "items": items }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        (0..count).map(|n| format!("item-{}", n)).collect()
    }

    /// Wait until every item has settled as completed or error.
    pub async fn wait_for_production(&self) {
        for _ in 0..200 {
            let items = self.session.items().await;
            if items.iter().all(|i| i.state.status.is_terminal()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("production did not settle");
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let (status, _, bytes) = self.get_raw(path).await;
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// GET returning status, headers and the raw body.
    pub async fn get_raw(&self, path: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, headers, bytes)
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
