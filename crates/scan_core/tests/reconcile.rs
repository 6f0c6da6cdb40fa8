use chrono::{Duration, Utc};
use scan_core::{
    update, CacheSnapshot, Effect, HistoryEntry, JobId, JobKind, JobStatus, MemorySnapshotStore,
    Msg, ReconcilePhase, SnapshotStore, TrackerSettings, TrackerState,
};

fn init_logging() {
    scan_logging::initialize_for_tests();
}

fn state_with(store: &MemorySnapshotStore) -> TrackerState {
    TrackerState::with_seed(TrackerSettings::default(), 5).with_mirror(Box::new(store.clone()))
}

fn running_snapshot(id: &str) -> CacheSnapshot {
    CacheSnapshot {
        active_job_id: Some(JobId::from(id)),
        active_kind: Some(JobKind::Web),
        is_running: true,
        log_lines: vec!["Crawled 4 pages".to_string()],
    }
}

fn history_entry(id: &str, status: JobStatus, age_secs: i64) -> HistoryEntry {
    let started_at = Utc::now() - Duration::seconds(age_secs);
    HistoryEntry {
        id: JobId::from(id),
        kind: JobKind::Web,
        status,
        subject_label: "https://example.com".to_string(),
        started_at,
        finished_at: status.is_terminal().then(|| started_at + Duration::seconds(10)),
        result_summary: None,
    }
}

#[test]
fn ghost_snapshot_is_discarded_after_reload() {
    init_logging();
    let store = MemorySnapshotStore::with_snapshot(running_snapshot("j2"));
    let (state, effects) = update(state_with(&store), Msg::SessionStarted);

    assert_eq!(
        effects,
        vec![Effect::QueryActiveHistory {
            job_id: JobId::from("j2"),
            kind: Some(JobKind::Web),
        }]
    );
    assert!(state.view().reconciling);

    // History knows other jobs, but nothing in progress named j2.
    let history = vec![
        history_entry("j1", JobStatus::Complete, 600),
        history_entry("j2", JobStatus::Complete, 300),
    ];
    let (state, effects) = update(state, Msg::ActiveHistoryLoaded(Ok(history)));

    assert!(effects.is_empty());
    assert_eq!(store.load(), None);
    assert!(!state.registry().is_any_active());
    assert!(!state.registry().contains(&JobId::from("j2")));
    assert!(state.view().log_lines.is_empty());
    assert!(!state.view().reconciling);
}

#[test]
fn in_progress_job_is_adopted_from_history() {
    init_logging();
    let store = MemorySnapshotStore::with_snapshot(running_snapshot("j7"));
    let (state, _) = update(state_with(&store), Msg::SessionStarted);
    let (state, _) = update(
        state,
        Msg::ActiveHistoryLoaded(Ok(vec![history_entry("j7", JobStatus::Crawling, 30)])),
    );

    assert!(state.registry().is_any_active());
    let view = state.view();
    assert_eq!(view.jobs.len(), 1);
    assert_eq!(view.jobs[0].status, JobStatus::Crawling);
    assert_eq!(view.log_lines, vec!["Crawled 4 pages".to_string()]);
    assert_eq!(
        store.load().and_then(|snapshot| snapshot.active_job_id),
        Some(JobId::from("j7"))
    );

    let (_state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchStatus {
            job_id: JobId::from("j7"),
            kind: JobKind::Web,
        }]
    );
}

#[test]
fn completed_job_restore_happens_once_per_session() {
    init_logging();
    let store = MemorySnapshotStore::new();
    let history = vec![
        history_entry("old", JobStatus::Complete, 900),
        history_entry("latest", JobStatus::Complete, 60),
    ];

    let (state, effects) = update(state_with(&store), Msg::SessionStarted);
    assert_eq!(effects, vec![Effect::QueryCompletedHistory]);
    let (state, _) = update(state, Msg::CompletedHistoryLoaded(Ok(history.clone())));
    let restored: Vec<_> = state.view().jobs.iter().map(|job| job.job_id.clone()).collect();
    assert_eq!(restored, vec![JobId::from("latest")]);
    assert_eq!(state.view().jobs[0].percent, 100);

    // Same state, second start (re-render): nothing happens.
    let (state, effects) = update(state, Msg::SessionStarted);
    assert!(effects.is_empty());
    // A stray duplicate reply is ignored as well.
    let (state, _) = update(state, Msg::CompletedHistoryLoaded(Ok(history)));
    assert_eq!(state.view().jobs.len(), 1);

    // Remounted owner: new state, same durable store.
    let (remounted, effects) = update(state_with(&store), Msg::SessionStarted);
    assert!(effects.is_empty());
    assert_eq!(*remounted.reconcile_phase(), ReconcilePhase::Done);
}

#[test]
fn restored_record_survives_grace_sweeps_until_dismissed() {
    init_logging();
    let store = MemorySnapshotStore::new();
    let (state, _) = update(state_with(&store), Msg::SessionStarted);
    let (state, _) = update(
        state,
        Msg::CompletedHistoryLoaded(Ok(vec![history_entry("latest", JobStatus::Complete, 60)])),
    );

    let later = Utc::now() + Duration::minutes(5);
    let (state, _) = update(state, Msg::ProgressTick { now: later });
    assert!(state.registry().contains(&JobId::from("latest")));

    let (state, _) = update(
        state,
        Msg::Dismissed {
            job_id: JobId::from("latest"),
        },
    );
    assert!(state.registry().is_empty());
}

#[test]
fn failed_restore_query_still_spends_the_guard() {
    init_logging();
    let store = MemorySnapshotStore::new();
    let (state, _) = update(state_with(&store), Msg::SessionStarted);
    let (state, _) = update(
        state,
        Msg::CompletedHistoryLoaded(Err(scan_core::RemoteError::new(
            scan_core::FailureKind::Network,
            "offline",
        ))),
    );
    assert!(state.registry().is_empty());
    assert!(store.restore_done());
}

#[test]
fn submissions_during_reconciliation_are_not_lost() {
    init_logging();
    let store = MemorySnapshotStore::with_snapshot(running_snapshot("ghost"));
    let (state, _) = update(state_with(&store), Msg::SessionStarted);
    let (state, effects) = update(
        state,
        Msg::SubmitRequested {
            kind: JobKind::Document,
            subject_label: "fresh.pdf".to_string(),
            payload: String::new(),
            now: Utc::now(),
        },
    );
    let fresh = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Submit(request) => Some(request.job_id.clone()),
            _ => None,
        })
        .expect("submit effect");

    let (state, _) = update(state, Msg::ActiveHistoryLoaded(Ok(Vec::new())));

    assert!(state.registry().contains(&fresh));
    assert_eq!(
        store.load().and_then(|snapshot| snapshot.active_job_id),
        Some(fresh)
    );
}

#[test]
fn adopted_queued_web_job_is_polled() {
    init_logging();
    let store = MemorySnapshotStore::with_snapshot(running_snapshot("j5"));
    let (state, _) = update(state_with(&store), Msg::SessionStarted);
    let (state, _) = update(
        state,
        Msg::ActiveHistoryLoaded(Ok(vec![history_entry("j5", JobStatus::Queued, 5)])),
    );
    assert_eq!(
        state.registry().get(&JobId::from("j5")).map(|job| job.status),
        Some(JobStatus::Queued)
    );

    let (_state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchStatus {
            job_id: JobId::from("j5"),
            kind: JobKind::Web,
        }]
    );
}

#[test]
fn adopted_document_job_is_polled_until_it_finishes() {
    init_logging();
    let store = MemorySnapshotStore::with_snapshot(CacheSnapshot {
        active_job_id: Some(JobId::from("d7")),
        active_kind: Some(JobKind::Document),
        is_running: true,
        log_lines: Vec::new(),
    });
    let document = HistoryEntry {
        kind: JobKind::Document,
        subject_label: "audit.pdf".to_string(),
        ..history_entry("d7", JobStatus::Scanning, 20)
    };
    let (state, _) = update(state_with(&store), Msg::SessionStarted);
    let (state, _) = update(state, Msg::ActiveHistoryLoaded(Ok(vec![document])));

    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchStatus {
            job_id: JobId::from("d7"),
            kind: JobKind::Document,
        }]
    );

    let now = Utc::now();
    let (state, _) = update(
        state,
        Msg::StatusReported {
            job_id: JobId::from("d7"),
            result: Ok(scan_core::StatusReply {
                status: Some(JobStatus::Complete),
                ..scan_core::StatusReply::default()
            }),
            now,
        },
    );
    assert!(!state.registry().is_any_active());
    assert_eq!(store.load(), None);

    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
    let (state, _) = update(state, Msg::ProgressTick { now: now + Duration::seconds(3) });
    assert!(state.registry().is_empty());
}
