//! Cancellation coordinator.
//!
//! Sending an abort changes nothing locally. Only a confirmed abort moves the
//! record to `error`/cancelled, and only if no terminal status got there
//! first; the registry's terminal-wins merge makes the late one a no-op.

use chrono::{DateTime, Utc};
use scan_logging::{scan_debug, scan_info, scan_warn};

use crate::{Effect, JobId, JobPatch, RemoteError, TrackerState};

pub(crate) fn request(state: &mut TrackerState, job_id: JobId) -> Vec<Effect> {
    match state.registry.get(&job_id) {
        None => {
            scan_debug!("Cancel for unknown job {} ignored", job_id);
            return Vec::new();
        }
        Some(job) if job.is_terminal() => {
            scan_debug!("Cancel for finished job {} ignored", job_id);
            return Vec::new();
        }
        Some(_) => {}
    }
    if !state.cancels_in_flight.insert(job_id.clone()) {
        scan_debug!("Cancel for job {} already in flight", job_id);
        return Vec::new();
    }

    scan_info!("Requesting cancel for job {}", job_id);
    state.registry.append_log(format!("Cancelling {job_id}"));
    state.mark_dirty();
    vec![Effect::Cancel { job_id }]
}

pub(crate) fn resolve(
    state: &mut TrackerState,
    job_id: JobId,
    result: Result<(), RemoteError>,
    now: DateTime<Utc>,
) {
    let was_pending = state.cancels_in_flight.remove(&job_id);
    if was_pending {
        state.mark_dirty();
    }

    match result {
        Ok(()) => {
            if !state.apply_patch(&job_id, &JobPatch::cancelled(), now) {
                scan_debug!(
                    "Cancel for job {} confirmed after it already finished",
                    job_id
                );
            }
        }
        Err(err) => {
            scan_warn!("Cancel for job {} failed: {}", job_id, err);
            if state.registry.contains(&job_id) {
                state
                    .registry
                    .append_log(format!("Cancel failed for {job_id}: {err}"));
                state.mark_dirty();
            }
        }
    }
}
