use chrono::{DateTime, Utc};
use scan_logging::{scan_debug, scan_info, scan_warn};

use crate::reconcile::{self, ActiveResolution, ReconcileStart};
use crate::state::ReconcilePhase;
use crate::{
    cancel, Effect, JobId, JobKind, JobPatch, JobRecord, JobStatus, Msg, RemoteError,
    SubmitRejection, SubmitReply, SubmitRequest, TrackerState,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: TrackerState, msg: Msg) -> (TrackerState, Vec<Effect>) {
    let effects = match msg {
        Msg::SessionStarted => start_session(&mut state),
        Msg::ActiveHistoryLoaded(history) => {
            let phase = std::mem::replace(&mut state.reconcile, ReconcilePhase::Done);
            match phase {
                ReconcilePhase::AwaitingActive {
                    job_id,
                    kind,
                    log_lines,
                } => {
                    let resolution =
                        reconcile::resolve_active(&mut state.registry, &job_id, kind, log_lines, history);
                    if let ActiveResolution::Adopted(adopted) = resolution {
                        if let Some(job) = state.registry.get(&adopted) {
                            state.progress.observe(job);
                        }
                    }
                    state.mark_dirty();
                }
                other => {
                    scan_debug!("Unexpected active-history reply in phase {:?}", other);
                    state.reconcile = other;
                }
            }
            Vec::new()
        }
        Msg::CompletedHistoryLoaded(history) => {
            if state.reconcile == ReconcilePhase::AwaitingRestore {
                state.reconcile = ReconcilePhase::Done;
                if let Some(restored) = reconcile::resolve_restore(&mut state.registry, history) {
                    if let Some(job) = state.registry.get(&restored) {
                        state.progress.observe(job);
                    }
                }
                state.mark_dirty();
            } else {
                scan_debug!("Ignoring completed-history reply outside reconciliation");
            }
            Vec::new()
        }
        Msg::SubmitRequested {
            kind,
            subject_label,
            payload,
            now,
        } => submit(&mut state, kind, &subject_label, payload, now),
        Msg::SubmitFinished {
            job_id,
            result,
            now,
        } => submit_finished(&mut state, job_id, result, now),
        Msg::StatusReported {
            job_id,
            result,
            now,
        } => {
            match result {
                Ok(reply) => {
                    let patch = reply.to_patch();
                    if !patch.is_empty() {
                        state.apply_patch(&job_id, &patch, now);
                    }
                }
                Err(err) => {
                    scan_warn!("Status check for job {} failed: {}", job_id, err);
                }
            }
            Vec::new()
        }
        // Adopted jobs of either kind are polled too; their submit reply
        // belonged to an earlier session.
        Msg::PollTick => state
            .registry
            .iter()
            .filter(|job| !job.is_terminal() && !state.submits_in_flight.contains(&job.id))
            .map(|job| Effect::FetchStatus {
                job_id: job.id.clone(),
                kind: job.kind,
            })
            .collect(),
        Msg::CancelRequested { job_id } => cancel::request(&mut state, job_id),
        Msg::CancelFinished {
            job_id,
            result,
            now,
        } => {
            cancel::resolve(&mut state, job_id, result, now);
            Vec::new()
        }
        Msg::Dismissed { job_id } => {
            if state.registry.remove(&job_id).is_some() {
                scan_debug!("Dismissed job {}", job_id);
                state.mark_dirty();
            }
            state.forget(&job_id);
            Vec::new()
        }
        Msg::ProgressTick { now } => {
            if state.progress.tick(&mut state.rng) {
                state.mark_dirty();
            }
            let grace = chrono::Duration::milliseconds(
                i64::try_from(state.settings.grace_period_ms).unwrap_or(i64::MAX),
            );
            for id in state.registry.sweep_expired(now, grace) {
                scan_debug!("Removed job {} after grace period", id);
                state.forget(&id);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::FinishTick => {
            if state.progress.finish_tick() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_session(state: &mut TrackerState) -> Vec<Effect> {
    if state.reconcile != ReconcilePhase::NotStarted {
        scan_debug!("Session already started; reconciliation skipped");
        return Vec::new();
    }
    state.mark_dirty();

    match reconcile::begin(&mut state.registry) {
        ReconcileStart::Idle | ReconcileStart::TrustedRegistry { .. } => {
            state.reconcile = ReconcilePhase::Done;
            Vec::new()
        }
        ReconcileStart::QueryActive {
            job_id,
            kind,
            log_lines,
        } => {
            state.reconcile = ReconcilePhase::AwaitingActive {
                job_id: job_id.clone(),
                kind,
                log_lines,
            };
            vec![Effect::QueryActiveHistory { job_id, kind }]
        }
        ReconcileStart::QueryCompleted => {
            state.reconcile = ReconcilePhase::AwaitingRestore;
            vec![Effect::QueryCompletedHistory]
        }
    }
}

/// Trims the label and, for web scans, requires an absolute http(s) URL.
pub fn validate_subject(kind: JobKind, subject_label: &str) -> Result<String, SubmitRejection> {
    let label = subject_label.trim();
    if label.is_empty() {
        return Err(SubmitRejection::EmptySubject);
    }
    if kind == JobKind::Web {
        let parsed = url::Url::parse(label).map_err(|err| SubmitRejection::InvalidUrl {
            label: label.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SubmitRejection::InvalidUrl {
                label: label.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
    }
    Ok(label.to_string())
}

fn submit(
    state: &mut TrackerState,
    kind: JobKind,
    subject_label: &str,
    payload: String,
    now: DateTime<Utc>,
) -> Vec<Effect> {
    let label = match validate_subject(kind, subject_label) {
        Ok(label) => label,
        Err(rejection) => {
            scan_warn!("Rejected {} submission: {}", kind, rejection);
            state.last_rejection = Some(rejection);
            state.mark_dirty();
            return Vec::new();
        }
    };
    state.last_rejection = None;

    let mut job_id = JobId::generate(now, &mut state.rng);
    while state.registry.contains(&job_id) {
        job_id = JobId::generate(now, &mut state.rng);
    }

    let record = JobRecord::new(job_id.clone(), kind, label.clone(), now);
    state.progress.observe(&record);
    state.registry.add(record);
    state.submits_in_flight.insert(job_id.clone());
    state
        .registry
        .append_log(format!("Submitted {kind} scan {job_id} for {label}"));
    scan_info!("Submitted {} scan {} for {}", kind, job_id, label);
    state.mark_dirty();

    vec![Effect::Submit(SubmitRequest {
        job_id,
        kind,
        subject_label: label,
        payload,
    })]
}

fn submit_finished(
    state: &mut TrackerState,
    job_id: JobId,
    result: Result<SubmitReply, RemoteError>,
    now: DateTime<Utc>,
) -> Vec<Effect> {
    state.submits_in_flight.remove(&job_id);
    let Some(kind) = state.registry.get(&job_id).map(|job| job.kind) else {
        scan_debug!("Submit reply for untracked job {} dropped", job_id);
        return Vec::new();
    };

    match result {
        Ok(SubmitReply::Accepted { job_id: echoed }) => {
            if let Some(echoed) = echoed.filter(|echoed| *echoed != job_id) {
                scan_warn!(
                    "Executor echoed id {} for job {}; keeping local id",
                    echoed,
                    job_id
                );
            }
            state.apply_patch(&job_id, &JobPatch::status(kind.running_status()), now);
            poll_if_web(state, job_id, kind)
        }
        Ok(SubmitReply::Completed {
            status,
            current_unit,
            total_units,
            result_summary,
        }) => {
            let patch = JobPatch {
                status: Some(status.unwrap_or(JobStatus::Complete)),
                current_unit,
                total_units,
                result_summary,
                ..JobPatch::default()
            };
            state.apply_patch(&job_id, &patch, now);
            poll_if_web(state, job_id, kind)
        }
        Err(err) => {
            scan_warn!("Submit for job {} failed: {}", job_id, err);
            state.apply_patch(&job_id, &JobPatch::failed(format!("Submit failed: {err}")), now);
            Vec::new()
        }
    }
}

fn poll_if_web(state: &TrackerState, job_id: JobId, kind: JobKind) -> Vec<Effect> {
    let still_active = state
        .registry
        .get(&job_id)
        .is_some_and(|job| !job.is_terminal());
    if kind == JobKind::Web && still_active {
        vec![Effect::FetchStatus { job_id, kind }]
    } else {
        Vec::new()
    }
}
