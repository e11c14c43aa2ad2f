//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process with
//! a real orchestrator wired to mock collaborators, so every endpoint can be
//! exercised without an executor bridge.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use questline_core::{
    load_config_from_str,
    testing::{MockExecutor, MockGateway},
    MemoryPreferenceStore, QuestGateway, QuestOrchestrator, SignalBus,
    TaskExecutor,
};
use questline_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use questline_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The orchestrator behind the router
    pub orchestrator: QuestOrchestrator,
    /// Mock gateway - configure quests and the application catalog
    pub gateway: Arc<MockGateway>,
    /// Mock executor - inspect calls, inject failures
    pub executor: Arc<MockExecutor>,
    /// The bus the signal webhook publishes into
    pub signals: SignalBus,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with an empty gateway.
    pub async fn new() -> Self {
        Self::with_gateway(MockGateway::new()).await
    }

    /// Create a test fixture around a configured gateway. The quest snapshot
    /// is loaded before the fixture is returned.
    pub async fn with_gateway(gateway: MockGateway) -> Self {
        let config = load_config_from_str(
            r#"
[executor]
url = "http://127.0.0.1:7420"

[server]
host = "127.0.0.1"
port = 8080

[orchestrator]
settle_delay_ms = 10
enroll_delay_ms = 0
install_dir = "/tmp/questline-test-games"
"#,
        )
        .expect("Failed to parse test config");

        let gateway = Arc::new(gateway);
        let executor = Arc::new(MockExecutor::new());
        let signals = SignalBus::default();

        let orchestrator = QuestOrchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&gateway) as Arc<dyn QuestGateway>,
            Arc::clone(&executor) as Arc<dyn TaskExecutor>,
            Arc::new(signals.clone()),
            Arc::new(MemoryPreferenceStore::new()),
            config.preferences.clone(),
        );
        orchestrator.start().await;
        orchestrator
            .refresh_quests(true)
            .await
            .expect("Initial refresh failed");

        let state = Arc::new(AppState::new(config, orchestrator.clone(), signals.clone()));
        let router = create_router(state);

        Self {
            router,
            orchestrator,
            gateway,
            executor,
            signals,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a request to the test server.
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

/// Helper to assert a response has expected status.
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
