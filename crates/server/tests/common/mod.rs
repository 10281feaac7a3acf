//! Common test utilities for driving the HTTP surface in-process.
//!
//! The fixture wires real SQLite stores in a temp directory to an
//! orchestrator backed by a scripted provider. The scheduling loop is not
//! started; tests run jobs explicitly with `run_next`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use harvester_core::{
    testing::{fixtures, MockProvider},
    ArtifactCache, CacheConfig, Config, DatabaseConfig, DocumentProvider, FetchClient,
    FileSnapshot, JobOrchestrator, PeriodResolver, ProviderConfig, ServerConfig,
    SqliteArtifactSink, SqliteCheckpointStore, SqliteJobStore,
};
use harvester_server::{create_router, AppState};

/// Test fixture for in-process API testing.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub orchestrator: Arc<JobOrchestrator>,
    /// Direct store access for arranging states the API cannot reach
    pub job_store: Arc<SqliteJobStore>,
    pub sink: Arc<SqliteArtifactSink>,
    /// Scripted provider; unscripted requests answer not-found
    pub provider: Arc<MockProvider>,
    /// Temporary directory for the database and cache snapshot
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_api_key(None).await
    }

    /// Create a fixture whose config carries the given provider key.
    pub async fn with_api_key(api_key: Option<&str>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let cache_path = temp_dir.path().join("cache.jsonl");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            provider: ProviderConfig {
                api_key: api_key.map(str::to_string),
                ..Default::default()
            },
            cache: CacheConfig {
                path: cache_path.clone(),
                chunk_size: None,
            },
            orchestrator: fixtures::fast_orchestrator_config(),
        };

        let job_store =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let checkpoints = Arc::new(
            SqliteCheckpointStore::new(&db_path).expect("Failed to create checkpoint store"),
        );
        let sink = Arc::new(SqliteArtifactSink::new(&db_path).expect("Failed to create sink"));
        let cache = Arc::new(ArtifactCache::load(Arc::new(FileSnapshot::new(cache_path))));

        let provider = Arc::new(MockProvider::new());
        let fetch_client = FetchClient::new(
            Arc::clone(&provider) as Arc<dyn DocumentProvider>,
            Duration::from_secs(5),
        );

        let resolver = PeriodResolver::new(config.orchestrator.horizon)
            .with_reference_date(NaiveDate::from_ymd_opt(2025, 5, 15).unwrap());

        let orchestrator = Arc::new(
            JobOrchestrator::new(
                config.orchestrator.clone(),
                job_store.clone(),
                checkpoints,
                cache,
                fetch_client,
            )
            .with_sink(sink.clone())
            .with_resolver(resolver),
        );

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
        let router = create_router(state);

        Self {
            router,
            orchestrator,
            job_store,
            sink,
            provider,
            temp_dir,
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

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let request_builder = Request::builder().method(method).uri(path);

        let request = match body {
            Some(json) => request_builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request_builder.body(Body::empty()).unwrap(),
        };

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

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
