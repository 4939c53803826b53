//! Integration tests for job submission, log queries, and streaming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use dronevox_core::{Command, CoreError, JobStatus, Params};
use dronevox_drone::{
    DroneConfig, DroneControl, DroneError, RecordingSleeper, Sleeper, ThreadSleeper,
};
use dronevox_jobs::{DroneFactory, JobService, JobsConfig, StreamEvent, UnknownActionPolicy};
use futures::StreamExt;
use serde_json::json;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn commands(v: serde_json::Value) -> Vec<Command> {
    serde_json::from_value(v).unwrap()
}

fn config(dir: &TempDir) -> JobsConfig {
    JobsConfig {
        poll_interval: Duration::from_millis(20),
        ..JobsConfig::under(dir.path())
    }
}

fn service_with(dir: &TempDir, sleeper: Arc<dyn Sleeper>) -> Arc<JobService> {
    Arc::new(JobService::simulated(config(dir), DroneConfig::default(), sleeper))
}

fn instant_service(dir: &TempDir) -> Arc<JobService> {
    service_with(dir, Arc::new(RecordingSleeper::new()))
}

/// Sleeps for a small real interval on every call so jobs stay in flight
/// long enough to be observed mid-run.
struct ShortSleeper;

impl Sleeper for ShortSleeper {
    fn sleep(&self, _duration: Duration) {
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Holds every drone wait until released, keeping the job running.
#[derive(Default)]
struct GateSleeper {
    released: AtomicBool,
}

impl Sleeper for GateSleeper {
    fn sleep(&self, _duration: Duration) {
        while !self.released.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

async fn wait_terminal(service: &JobService, job_id: &str) -> JobStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = service.status(job_id).unwrap();
        if status.is_terminal() {
            return status;
        }
        assert!(Instant::now() < deadline, "job {job_id} never finished");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn strip_stamp(line: &str) -> &str {
    &line[11..]
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_before_commands_run() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with(&dir, Arc::new(ThreadSleeper));

    let started = Instant::now();
    let job = service
        .submit(commands(json!([{"action": "land"}, {"action": "land"}])))
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let status = service.status(&job.job_id.to_string()).unwrap();
    assert!(!status.is_terminal());
}

#[tokio::test]
async fn submit_yields_unique_ids_and_tracks_latest() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);
    assert!(service.latest_job_id().is_none());

    let mut ids = Vec::new();
    for _ in 0..20 {
        let job = service.submit(commands(json!([{"action": "land"}]))).unwrap();
        assert_eq!(service.latest_job_id(), Some(job.job_id));
        assert!(!ids.contains(&job.job_id));
        ids.push(job.job_id);
    }
}

#[tokio::test]
async fn empty_submission_is_rejected_and_not_registered() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let err = service.submit(Vec::new()).unwrap_err();
    assert_matches!(err, CoreError::InvalidArgument(_));
    assert!(service.registry().is_empty());
    assert!(service.latest_job_id().is_none());
}

#[tokio::test]
async fn submission_persists_log_and_payload_files() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let job = service
        .submit(commands(json!([{"action": "up", "params": {"distance": 20}}])))
        .unwrap();
    let id = job.job_id.to_string();
    wait_terminal(&service, &id).await;

    let log_path = dir.path().join("command_logs").join(format!("{id}.log"));
    assert!(log_path.exists());

    let payload_path = job.command_file.unwrap();
    assert_eq!(
        payload_path,
        dir.path().join("command_history").join(format!("{id}.json"))
    );
    let payload: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(payload_path).unwrap()).unwrap();
    assert_eq!(payload["commands"][0]["action"], "up");
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn takeoff_then_land_completes() {
    let dir = tempfile::tempdir().unwrap();
    let sleeper = Arc::new(RecordingSleeper::new());
    let service = service_with(&dir, sleeper.clone());

    let job = service
        .submit(commands(json!([
            {"action": "takeoff", "params": {"altitude": 30}},
            {"action": "land"}
        ])))
        .unwrap();
    let id = job.job_id.to_string();

    assert_eq!(wait_terminal(&service, &id).await, JobStatus::Completed);
    assert_eq!(
        sleeper.recorded(),
        vec![Duration::from_secs(1), Duration::from_secs(3)]
    );

    let chunk = service.get_logs(&id, 0).unwrap();
    let messages: Vec<&str> = chunk.logs.iter().map(|l| strip_stamp(l)).collect();
    let position = |needle: &str| {
        messages
            .iter()
            .position(|m| m.contains(needle))
            .unwrap_or_else(|| panic!("missing {needle:?} in {messages:#?}"))
    };

    let takeoff_start = position("'takeoff' starting");
    let wait_notice = position("expected duration 1.00s");
    let takeoff_done = position("'takeoff' completed.");
    let land_start = position("'land' starting");
    let land_done = position("'land' completed.");
    let all_done = position("All commands completed");
    assert!(takeoff_start < wait_notice);
    assert!(wait_notice < takeoff_done);
    assert!(takeoff_done < land_start);
    assert!(land_start < land_done);
    assert!(land_done < all_done);
    assert_eq!(all_done, messages.len() - 1);
}

#[tokio::test]
async fn unknown_action_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let job = service
        .submit(commands(json!([{"action": "unknown_widget", "params": {}}])))
        .unwrap();
    let id = job.job_id.to_string();

    assert_eq!(wait_terminal(&service, &id).await, JobStatus::Completed);
    let logs = service.get_logs(&id, 0).unwrap().logs;
    assert!(logs
        .iter()
        .any(|l| l.ends_with("'unknown_widget' skipped: unknown action")));
}

#[tokio::test]
async fn unknown_action_fails_under_hard_policy() {
    let dir = tempfile::tempdir().unwrap();
    let config = JobsConfig {
        unknown_action_policy: UnknownActionPolicy::Fail,
        ..config(&dir)
    };
    let service = JobService::simulated(
        config,
        DroneConfig::default(),
        Arc::new(RecordingSleeper::new()),
    );

    let job = service
        .submit(commands(json!([{"action": "unknown_widget"}])))
        .unwrap();
    let id = job.job_id.to_string();
    assert_eq!(wait_terminal(&service, &id).await, JobStatus::Failed);
}

#[tokio::test]
async fn bad_parameter_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let sleeper = Arc::new(RecordingSleeper::new());
    let service = service_with(&dir, sleeper.clone());

    let job = service
        .submit(commands(json!([
            {"action": "forward", "params": {"distance": "not_a_number"}},
            {"action": "land"}
        ])))
        .unwrap();
    let id = job.job_id.to_string();

    assert_eq!(wait_terminal(&service, &id).await, JobStatus::Failed);
    let logs = service.get_logs(&id, 0).unwrap().logs;
    let last = strip_stamp(logs.last().unwrap());
    assert!(last.starts_with("'forward' failed:"), "{last}");
    assert!(!logs.iter().any(|l| l.contains("'land'")));
    assert!(sleeper.recorded().is_empty());
}

struct PanickingDrone;

impl DroneControl for PanickingDrone {
    fn has_capability(&self, _action: &str) -> bool {
        true
    }

    fn execute(
        &mut self,
        _action: &str,
        _params: &Params,
        _out: &mut dyn std::io::Write,
    ) -> Result<(), DroneError> {
        panic!("rotor fell off");
    }
}

#[tokio::test]
async fn runner_panic_is_caught_and_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let factory: DroneFactory = Arc::new(|| Box::new(PanickingDrone) as Box<dyn DroneControl>);
    let service = JobService::new(config(&dir), factory);

    let job = service
        .submit(commands(json!([{"action": "up", "params": {"distance": 5}}])))
        .unwrap();
    let id = job.job_id.to_string();

    assert_eq!(wait_terminal(&service, &id).await, JobStatus::Failed);
    let logs = service.get_logs(&id, 0).unwrap().logs;
    assert!(logs
        .last()
        .unwrap()
        .ends_with("Unexpected failure: runner panicked: rotor fell off"));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    assert_matches!(
        service.get_logs("6f1c4c1e-0000-4000-8000-000000000000", 0),
        Err(CoreError::NotFound { .. })
    );
    assert_matches!(service.get_logs("garbage", 0), Err(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn repeated_reads_at_same_offset_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let job = service
        .submit(commands(json!([{"action": "up", "params": {"distance": 10}}])))
        .unwrap();
    let id = job.job_id.to_string();
    wait_terminal(&service, &id).await;

    let first = service.get_logs(&id, 2).unwrap();
    let second = service.get_logs(&id, 2).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn terminal_status_never_reverts() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let job = service.submit(commands(json!([{"action": "land"}]))).unwrap();
    let id = job.job_id.to_string();
    let status = wait_terminal(&service, &id).await;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(service.get_logs(&id, 0).unwrap().status, status);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cursor_reads_during_execution_have_no_gaps_or_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with(&dir, Arc::new(ShortSleeper));

    let steps: Vec<serde_json::Value> = (0..25)
        .map(|i| json!({"action": "up", "params": {"distance": i}}))
        .collect();
    let job = service.submit(commands(json!(steps))).unwrap();
    let id = job.job_id.to_string();

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let service = Arc::clone(&service);
            let id = id.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                let mut cursor = 0;
                loop {
                    let chunk = service.get_logs(&id, cursor).unwrap();
                    assert_eq!(chunk.next_index, cursor + chunk.logs.len());
                    seen.extend(chunk.logs);
                    cursor = chunk.next_index;
                    if chunk.status.is_terminal() {
                        let tail = service.get_logs(&id, cursor).unwrap();
                        seen.extend(tail.logs);
                        return seen;
                    }
                    tokio::time::sleep(Duration::from_millis(3)).await;
                }
            })
        })
        .collect();

    let mut collected = Vec::new();
    for reader in readers {
        collected.push(reader.await.unwrap());
    }

    let full = service.get_logs(&id, 0).unwrap().logs;
    for seen in collected {
        assert_eq!(seen, full);
    }
}

#[tokio::test]
async fn latest_view_resets_for_unknown_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let empty = service.get_latest(0, None, false).unwrap();
    assert!(empty.job_id.is_none());
    assert!(empty.logs.is_empty());
    assert!(!empty.reset);

    let old = service.submit(commands(json!([{"action": "land"}]))).unwrap();
    wait_terminal(&service, &old.job_id.to_string()).await;
    let new = service.submit(commands(json!([{"action": "land"}]))).unwrap();
    let new_id = new.job_id.to_string();
    wait_terminal(&service, &new_id).await;

    let view = service
        .get_latest(3, Some(&old.job_id.to_string()), false)
        .unwrap();
    assert_eq!(view.job_id, Some(new.job_id));
    assert!(view.reset);
    assert_eq!(view.logs, service.get_logs(&new_id, 0).unwrap().logs);

    let followed = service.get_latest(3, Some(&new_id), false).unwrap();
    assert!(!followed.reset);
    assert_eq!(followed.logs, service.get_logs(&new_id, 3).unwrap().logs);
    assert_eq!(followed.status, Some(JobStatus::Completed));
}

#[tokio::test]
async fn latest_view_running_only_hides_finished_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let job = service.submit(commands(json!([{"action": "land"}]))).unwrap();
    wait_terminal(&service, &job.job_id.to_string()).await;

    let view = service.get_latest(0, None, true).unwrap();
    assert!(view.job_id.is_none());
    assert_eq!(view.next_index, 0);
    assert!(view.status.is_none());
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_delivers_every_line_then_status() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with(&dir, Arc::new(ShortSleeper));

    let job = service
        .submit(commands(json!([
            {"action": "takeoff"},
            {"action": "cw", "params": {"degree": 90}},
            {"action": "land"}
        ])))
        .unwrap();
    let id = job.job_id.to_string();

    let events: Vec<StreamEvent> = tokio::time::timeout(
        Duration::from_secs(10),
        service.stream_logs(&id, 0).collect(),
    )
    .await
    .unwrap();

    let (status, lines) = events.split_last().unwrap();
    assert_eq!(*status, StreamEvent::Status(JobStatus::Completed));

    let streamed: Vec<String> = lines
        .iter()
        .map(|e| match e {
            StreamEvent::Line(l) => l.clone(),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(streamed, service.get_logs(&id, 0).unwrap().logs);
}

#[tokio::test]
async fn stream_from_offset_skips_earlier_lines() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let job = service.submit(commands(json!([{"action": "land"}]))).unwrap();
    let id = job.job_id.to_string();
    wait_terminal(&service, &id).await;

    let full = service.get_logs(&id, 0).unwrap().logs;
    let events: Vec<StreamEvent> = service.stream_logs(&id, 2).collect().await;

    let mut expected: Vec<StreamEvent> =
        full[2..].iter().cloned().map(StreamEvent::Line).collect();
    expected.push(StreamEvent::Status(JobStatus::Completed));
    assert_eq!(events, expected);
}

#[tokio::test]
async fn stream_of_unknown_job_ends_with_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);

    let events: Vec<StreamEvent> = service.stream_logs("missing", 0).collect().await;
    assert_eq!(events, vec![StreamEvent::NotFound]);
}

#[tokio::test]
async fn stream_of_unreadable_log_ends_with_read_failed() {
    let dir = tempfile::tempdir().unwrap();
    let service = instant_service(&dir);
    let job = service.submit(commands(json!([{"action": "land"}]))).unwrap();
    let id = job.job_id.to_string();
    wait_terminal(&service, &id).await;

    let path = service.registry().find(&id).unwrap().path().to_path_buf();
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    let events: Vec<StreamEvent> = service.stream_logs(&id, 0).collect().await;
    assert_eq!(events, vec![StreamEvent::ReadFailed]);
}

#[tokio::test]
async fn dropping_a_stream_does_not_affect_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with(&dir, Arc::new(ShortSleeper));

    let job = service
        .submit(commands(json!([{"action": "up", "params": {"distance": 1}}, {"action": "land"}])))
        .unwrap();
    let id = job.job_id.to_string();

    {
        let mut stream = Box::pin(service.stream_logs(&id, 0));
        let first = stream.next().await.unwrap();
        assert_matches!(first, StreamEvent::Line(_));
    }

    assert_eq!(wait_terminal(&service, &id).await, JobStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_ends_open_streams_but_not_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(GateSleeper::default());
    let service = service_with(&dir, gate.clone());

    let job = service
        .submit(commands(json!([{"action": "forward", "params": {"distance": 3000}}])))
        .unwrap();
    let id = job.job_id.to_string();

    let mut stream = Box::pin(service.stream_logs(&id, 0));
    assert_matches!(stream.next().await, Some(StreamEvent::Line(_)));
    assert!(!service.is_closing());

    service.begin_shutdown();
    assert!(service.is_closing());

    let rest: Vec<StreamEvent> = tokio::time::timeout(Duration::from_secs(5), stream.collect())
        .await
        .expect("stream kept running after shutdown");
    assert_eq!(rest.last(), Some(&StreamEvent::Closing));
    assert!(!rest.iter().any(|e| matches!(e, StreamEvent::Status(_))));
    assert_eq!(service.status(&id).unwrap(), JobStatus::Running);

    // New streams end straight away.
    let late: Vec<StreamEvent> = service.stream_logs(&id, 0).collect().await;
    assert_eq!(late.last(), Some(&StreamEvent::Closing));

    gate.released.store(true, Ordering::Release);
    assert_eq!(wait_terminal(&service, &id).await, JobStatus::Completed);
}
