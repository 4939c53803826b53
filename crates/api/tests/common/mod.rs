#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use dronevox_api::config::ServerConfig;
use dronevox_api::router::build_app_router;
use dronevox_api::state::AppState;
use dronevox_drone::{DroneConfig, RecordingSleeper};
use dronevox_jobs::{JobService, JobsConfig, UnknownActionPolicy};
use dronevox_planner::{CommandPlanner, DronePlan, PlannerError, Transcriber, TranscriptionError};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

/// Build a test `ServerConfig` with job files under `root`.
pub fn test_config(root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jobs: JobsConfig {
            poll_interval: Duration::from_millis(20),
            unknown_action_policy: UnknownActionPolicy::Skip,
            ..JobsConfig::under(root)
        },
        drone: DroneConfig::default(),
        planner: None,
        transcription: None,
    }
}

/// The full application plus handles tests inspect directly.
pub struct TestApp {
    pub router: Router,
    pub jobs: Arc<JobService>,
    pub sleeper: Arc<RecordingSleeper>,
    pub dir: TempDir,
}

/// Build the full application router with all middleware layers.
///
/// Drone waits are recorded instead of slept, so jobs finish immediately.
pub fn build_test_app() -> TestApp {
    build_test_app_with(None, None)
}

pub fn build_test_app_with(
    transcriber: Option<Arc<dyn Transcriber>>,
    planner: Option<Arc<dyn CommandPlanner>>,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let sleeper = Arc::new(RecordingSleeper::new());
    let jobs = Arc::new(JobService::simulated(
        config.jobs.clone(),
        config.drone,
        sleeper.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        jobs: Arc::clone(&jobs),
        transcriber,
        planner,
    };

    TestApp {
        router: build_app_router(state, &config),
        jobs,
        sleeper,
        dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Submit `commands` and return the new job id.
pub async fn submit(app: &TestApp, commands: serde_json::Value) -> String {
    let response = post_json(app, "/api/v1/jobs", serde_json::json!({ "commands": commands })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Poll the logs endpoint until the job reports a terminal status.
pub async fn wait_for_terminal(app: &TestApp, job_id: &str) -> serde_json::Value {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let response = get(app, &format!("/api/v1/jobs/{job_id}/logs")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["status"] == "completed" || json["status"] == "failed" {
            return json;
        }
        assert!(Instant::now() < deadline, "job {job_id} never finished");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Transcriber returning a fixed text, or failing when given `None`.
pub struct FixedTranscriber(pub Option<&'static str>);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _file_name: &str, _audio: Vec<u8>) -> Result<String, TranscriptionError> {
        match self.0 {
            Some(text) => Ok(text.to_string()),
            None => Err(TranscriptionError::Api {
                status: 503,
                body: "model overloaded".to_string(),
            }),
        }
    }
}

/// Planner answering every utterance with a fixed model output, or failing
/// when given `None`.
pub struct FixedPlanner(pub Option<&'static str>);

#[async_trait]
impl CommandPlanner for FixedPlanner {
    async fn plan(&self, text: &str) -> Result<DronePlan, PlannerError> {
        if text.trim().is_empty() {
            return Ok(DronePlan::empty());
        }
        match self.0 {
            Some(output) => DronePlan::from_model_output(output),
            None => Err(PlannerError::NoModelAvailable),
        }
    }
}

/// A multipart body with one `file` field. Returns `(content_type, body)`.
pub fn multipart_upload(file_name: Option<&str>, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "dronevox-test-boundary";
    let disposition = match file_name {
        Some(name) => format!("form-data; name=\"file\"; filename=\"{name}\""),
        None => "form-data; name=\"file\"".to_string(),
    };

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub async fn post_upload(app: &TestApp, file_name: Option<&str>) -> Response<Body> {
    let (content_type, body) = multipart_upload(file_name, b"RIFF....WAVEfmt ");
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/transcribe")
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}
