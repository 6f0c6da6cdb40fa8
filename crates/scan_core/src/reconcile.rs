//! Session-start reconciliation between the durable snapshot, the registry
//! and the remote history.
//!
//! Reconciliation is split at its remote queries: [`begin`] decides what to
//! ask for, [`resolve_active`] and [`resolve_restore`] apply the answers.

use scan_logging::{scan_debug, scan_info, scan_warn};

use crate::{HistoryEntry, JobId, JobKind, JobRegistry, JobStatus, RemoteError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStart {
    /// No running snapshot and the restore guard is already spent.
    Idle,
    /// The registry already tracks the snapshot's job; snapshot rewritten.
    TrustedRegistry { job_id: JobId },
    /// Ask history whether the snapshot's job is still in progress.
    QueryActive {
        job_id: JobId,
        kind: Option<JobKind>,
        log_lines: Vec<String>,
    },
    /// Restore the most recent completed job for display.
    QueryCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveResolution {
    Adopted(JobId),
    Discarded,
}

/// Loads the snapshot, drops finished leftovers and decides which history
/// query to run, if any. Spends the restore guard when it asks for one.
pub fn begin(registry: &mut JobRegistry) -> ReconcileStart {
    let snapshot = registry.mirror().and_then(|mirror| mirror.load());

    for id in registry.remove_terminal() {
        scan_debug!("Removed leftover finished job {} at session start", id);
    }

    let running = snapshot.as_ref().and_then(|snapshot| snapshot.running_job().cloned());
    if let Some(job_id) = running {
        let tracked = registry
            .get(&job_id)
            .is_some_and(|job| !job.is_terminal());
        if tracked {
            scan_info!("Snapshot job {} already tracked; trusting registry", job_id);
            registry.persist_snapshot();
            return ReconcileStart::TrustedRegistry { job_id };
        }
        let (kind, log_lines) = snapshot
            .map(|snapshot| (snapshot.active_kind, snapshot.log_lines))
            .unwrap_or_default();
        scan_info!("Snapshot claims job {} is running; checking history", job_id);
        return ReconcileStart::QueryActive {
            job_id,
            kind,
            log_lines,
        };
    }

    if registry.restore_done() {
        scan_debug!("History restore already done this session");
        return ReconcileStart::Idle;
    }
    registry.mark_restore_done();
    ReconcileStart::QueryCompleted
}

/// Adopts the snapshot's job from in-progress history or discards the snapshot.
///
/// A failed history query is treated like "not found".
pub fn resolve_active(
    registry: &mut JobRegistry,
    wanted: &JobId,
    kind: Option<JobKind>,
    log_lines: Vec<String>,
    history: Result<Vec<HistoryEntry>, RemoteError>,
) -> ActiveResolution {
    let entries = match history {
        Ok(entries) => entries,
        Err(err) => {
            scan_warn!("History lookup for {} failed: {}", wanted, err);
            Vec::new()
        }
    };

    let kind = kind.or_else(|| {
        entries
            .iter()
            .find(|entry| &entry.id == wanted)
            .map(|entry| entry.kind)
    });
    let mut candidates: Vec<HistoryEntry> = entries
        .into_iter()
        .filter(HistoryEntry::is_in_progress)
        .filter(|entry| kind.is_none_or(|kind| entry.kind == kind))
        .collect();

    if !candidates.iter().any(|entry| &entry.id == wanted) {
        scan_info!(
            "Job {} is no longer in progress remotely; discarding snapshot",
            wanted
        );
        registry.persist_snapshot();
        return ActiveResolution::Discarded;
    }

    // Newest first; the sort is stable so equal start times keep history order.
    candidates.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    let winner = candidates.remove(0);
    for orphan in &candidates {
        scan_warn!(
            "Dropping orphaned in-progress {} job {} (started {})",
            orphan.kind,
            orphan.id,
            orphan.started_at
        );
    }

    let winner_id = winner.id.clone();
    if registry.contains(&winner_id) {
        return ActiveResolution::Adopted(winner_id);
    }

    let mut lines = log_lines;
    lines.extend(registry.log_lines().cloned());
    registry.replace_log(lines);
    registry.add(winner.into_record(false));
    scan_info!("Adopted in-progress job {} from history", winner_id);
    ActiveResolution::Adopted(winner_id)
}

/// Shows the most recent completed job as a display-only record.
///
/// Returns the restored id, or `None` when nothing new was added.
pub fn resolve_restore(
    registry: &mut JobRegistry,
    history: Result<Vec<HistoryEntry>, RemoteError>,
) -> Option<JobId> {
    let entries = match history {
        Ok(entries) => entries,
        Err(err) => {
            scan_warn!("Completed-history lookup failed: {}", err);
            return None;
        }
    };

    let latest = entries
        .into_iter()
        .filter(|entry| entry.status == JobStatus::Complete)
        .max_by_key(|entry| entry.finished_at.unwrap_or(entry.started_at))?;

    if registry.contains(&latest.id) {
        scan_debug!("Completed job {} already displayed", latest.id);
        return None;
    }
    let id = latest.id.clone();
    registry.add(latest.into_record(true));
    scan_info!("Restored last completed job {} for display", id);
    Some(id)
}
