//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock providers injected, enabling end-to-end testing of scan, search
//! and download without reaching real subtitle catalogs.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use subscout_core::{testing::MockProvider, Config, ProviderRegistry};
use subscout_server::api::{create_router, WsBroadcaster};
use subscout_server::state::AppState;

/// Re-export fixtures for test convenience
pub use subscout_core::testing::fixtures;

/// Name of the first mock provider (supports downloads).
pub const PRIMARY: &str = "assrt";
/// Name of the second mock provider (search only).
pub const SECONDARY: &str = "opensubtitles";

/// Test fixture for E2E testing with mock providers.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new().await;
///     fixture.add_media_file("Movie.Name.2010.mkv");
///     fixture.scan().await;
///
///     let response = fixture.post("/api/v1/media/1/search", json!({})).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state behind the router
    pub state: Arc<AppState>,
    /// Mock provider that supports downloads
    pub primary: Arc<MockProvider>,
    /// Mock provider without download support
    pub secondary: Arc<MockProvider>,
    /// Media library root
    pub media_dir: PathBuf,
    /// Subtitle output directory
    pub output_dir: PathBuf,
    /// Temporary directory holding the database, library and output
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_providers(
            MockProvider::new(PRIMARY).with_download("subtitle.srt", b"1\n00:00:01,000 --> 00:00:02,000\nHi\n"),
            MockProvider::new(SECONDARY),
        )
        .await
    }

    /// Create a test fixture with custom provider mocks.
    pub async fn with_providers(primary: MockProvider, secondary: MockProvider) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let media_dir = temp_dir.path().join("media");
        let output_dir = temp_dir.path().join("subs");
        std::fs::create_dir_all(&media_dir).expect("Failed to create media dir");

        let mut config = Config::default();
        config.server.host = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        config.database.path = temp_dir.path().join("test.db");
        config.library.media_paths = vec![media_dir.to_string_lossy().to_string()];
        config.library.subtitle_output_path = output_dir.to_string_lossy().to_string();
        config.search.provider_timeout_secs = 2;
        config.security.app_secret = "fixture-secret".to_string();

        let primary = Arc::new(primary);
        let secondary = Arc::new(secondary);
        let registry = ProviderRegistry::new()
            .with(Arc::clone(&primary) as Arc<dyn subscout_core::SubtitleProvider>)
            .with(Arc::clone(&secondary) as Arc<dyn subscout_core::SubtitleProvider>);

        let state = Arc::new(
            AppState::open(config, registry, WsBroadcaster::default())
                .expect("Failed to open app state"),
        );
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            primary,
            secondary,
            media_dir,
            output_dir,
            temp_dir,
        }
    }

    /// Create an empty video file in the library.
    pub fn add_media_file(&self, name: &str) {
        std::fs::write(self.media_dir.join(name), b"").expect("Failed to write media file");
    }

    /// Store a credential for `provider` through the API.
    pub async fn configure(&self, provider: &str) {
        let response = self
            .put(
                &format!("/api/v1/providers/{}/credentials", provider),
                serde_json::json!({ "token": format!("{}-token", provider) }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "configure {}", provider);
    }

    /// Start a scan through the API and wait for the job to finish.
    pub async fn scan(&self) -> Value {
        let response = self.post("/api/v1/scan", serde_json::json!({})).await;
        assert_eq!(response.status, StatusCode::ACCEPTED);
        let job_id = response.body["id"].as_str().expect("job id").to_string();

        for _ in 0..100 {
            let jobs = self.get("/api/v1/jobs").await;
            if let Some(job) = jobs.body["jobs"]
                .as_array()
                .and_then(|jobs| jobs.iter().find(|job| job["id"] == job_id.as_str()))
            {
                if job["status"] == "completed" || job["status"] == "failed" {
                    return job.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("scan job {} did not finish", job_id);
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
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
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&body_bytes).to_string())
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
