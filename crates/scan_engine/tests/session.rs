use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scan_core::{
    CacheSnapshot, JobId, JobKind, JobOutcome, JobStatus, Msg, ReconcilePhase, SnapshotStore,
    TrackerSettings, TrackerState,
};
use scan_engine::{
    ClientSettings, EngineHandle, FileSnapshotStore, HttpScanClient, ScanSession,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

fn fast_settings() -> TrackerSettings {
    TrackerSettings {
        grace_period_ms: 200,
        progress_tick_ms: 20,
        finish_tick_ms: 5,
        poll_interval_ms: 50,
        ..TrackerSettings::default()
    }
}

fn session_for(server: &MockServer, cache: &TempDir) -> ScanSession {
    scan_logging::initialize_for_tests();
    let client = HttpScanClient::new(&ClientSettings {
        base_url: format!("{}/api", server.uri()),
        ..ClientSettings::default()
    })
    .expect("client");
    let client = Arc::new(client);
    let engine = EngineHandle::new(client.clone(), client).expect("engine");
    let store = FileSnapshotStore::new(cache.path()).with_session("test");
    let state = TrackerState::with_seed(fast_settings(), 3).with_mirror(Box::new(store));
    ScanSession::new(state, engine)
}

async fn mount_empty_history(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/scans/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

fn only_job(session: &ScanSession) -> Option<JobId> {
    session.state().registry().iter().next().map(|job| job.id.clone())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn polled_web_scan_completes_and_leaves_after_grace() {
    let server = MockServer::start().await;
    mount_empty_history(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/scans"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"jobId": "remote-1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/scans/scan-[0-9]+-[0-9a-z]{8}$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "currentUnit": 12,
            "totalUnits": 12,
            "message": "12 pages crawled"
        })))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let mut session = session_for(&server, &cache);
    session.start();
    assert!(session.run_until(WAIT, |state| !state.reconcile_phase().is_pending()).await);

    session.dispatch(Msg::SubmitRequested {
        kind: JobKind::Web,
        subject_label: "https://example.com".to_string(),
        payload: String::new(),
        now: Utc::now(),
    });
    let job_id = only_job(&session).expect("tracked job");

    let completed = session
        .run_until(WAIT, |state| {
            state
                .registry()
                .get(&job_id)
                .is_some_and(|job| job.status == JobStatus::Complete)
        })
        .await;
    assert!(completed);
    assert_eq!(
        session.state().registry().get(&job_id).unwrap().outcome,
        Some(JobOutcome::Completed)
    );

    let removed = session
        .run_until(WAIT, |state| !state.registry().contains(&job_id))
        .await;
    assert!(removed);
    assert!(!session.state().registry().is_any_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ghost_snapshot_from_previous_run_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scans/history"))
        .and(query_param("status", "in_progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let mut previous = FileSnapshotStore::new(cache.path()).with_session("test");
    previous.save(&CacheSnapshot {
        active_job_id: Some(JobId::from("j2")),
        active_kind: Some(JobKind::Web),
        is_running: true,
        log_lines: vec!["Crawled 3 pages".to_string()],
    });

    let mut session = session_for(&server, &cache);
    session.start();
    let settled = session
        .run_until(WAIT, |state| *state.reconcile_phase() == ReconcilePhase::Done)
        .await;
    assert!(settled);

    assert!(session.state().registry().is_empty());
    assert!(session.view().log_lines.is_empty());
    assert_eq!(FileSnapshotStore::new(cache.path()).load(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_web_scan_ends_as_cancelled() {
    let server = MockServer::start().await;
    mount_empty_history(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/scans"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/scans/scan-"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "crawling"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/scans/scan-"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let mut session = session_for(&server, &cache);
    session.start();
    session.dispatch(Msg::SubmitRequested {
        kind: JobKind::Web,
        subject_label: "https://example.com".to_string(),
        payload: String::new(),
        now: Utc::now(),
    });
    let job_id = only_job(&session).expect("tracked job");
    let running = session
        .run_until(WAIT, |state| {
            state
                .registry()
                .get(&job_id)
                .is_some_and(|job| job.status == JobStatus::Crawling)
        })
        .await;
    assert!(running);

    session.dispatch(Msg::CancelRequested {
        job_id: job_id.clone(),
    });
    // A second click while the first is in flight sends nothing.
    session.dispatch(Msg::CancelRequested {
        job_id: job_id.clone(),
    });

    let cancelled = session
        .run_until(WAIT, |state| {
            state
                .registry()
                .get(&job_id)
                .is_some_and(|job| job.outcome == Some(JobOutcome::Cancelled))
        })
        .await;
    assert!(cancelled);
    assert_eq!(
        session.state().registry().get(&job_id).unwrap().status,
        JobStatus::Error
    );
}
