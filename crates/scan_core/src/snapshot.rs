//! Durable cache mirror contract.
//!
//! The registry writes a [`CacheSnapshot`] through a [`SnapshotStore`] after
//! every mutation. The snapshot is deliberately small: which job was running,
//! and the log lines shown next to it.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{JobId, JobKind, JobRecord};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSnapshot {
    pub active_job_id: Option<JobId>,
    pub active_kind: Option<JobKind>,
    pub is_running: bool,
    pub log_lines: Vec<String>,
}

impl CacheSnapshot {
    /// Captures the most relevant active job (latest `started_at`, later
    /// insertion wins ties) together with the log buffer.
    pub fn capture<'a>(
        jobs: impl IntoIterator<Item = &'a JobRecord>,
        log_lines: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut active: Option<&JobRecord> = None;
        for job in jobs.into_iter().filter(|job| !job.is_terminal()) {
            match active {
                Some(current) if current.started_at > job.started_at => {}
                _ => active = Some(job),
            }
        }

        Self {
            active_job_id: active.map(|job| job.id.clone()),
            active_kind: active.map(|job| job.kind),
            is_running: active.is_some(),
            log_lines: log_lines.into_iter().cloned().collect(),
        }
    }

    /// The job the snapshot claims is still running, if any.
    ///
    /// A missing id or a cleared running flag both mean "nothing running".
    pub fn running_job(&self) -> Option<&JobId> {
        if self.is_running {
            self.active_job_id.as_ref()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.running_job().is_none() && self.log_lines.is_empty()
    }
}

/// Local durable key-value store backing the mirror.
///
/// Writes are best effort: implementations log failures instead of
/// returning them, and an unreadable entry loads as `None`.
pub trait SnapshotStore: Send {
    fn load(&self) -> Option<CacheSnapshot>;
    fn save(&mut self, snapshot: &CacheSnapshot);
    fn clear(&mut self);
    /// One-shot history restore guard, kept apart from the snapshot so
    /// clearing the snapshot never resets it.
    fn restore_done(&self) -> bool;
    fn mark_restore_done(&mut self);
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshot: Option<CacheSnapshot>,
    restore_done: bool,
}

/// In-memory store. Clones share the same contents, so a test can keep a
/// handle after moving one into the registry.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        let store = Self::default();
        store.lock().snapshot = Some(snapshot);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a test panicked mid-write; the data is
        // still usable.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Option<CacheSnapshot> {
        self.lock().snapshot.clone()
    }

    fn save(&mut self, snapshot: &CacheSnapshot) {
        self.lock().snapshot = Some(snapshot.clone());
    }

    fn clear(&mut self) {
        self.lock().snapshot = None;
    }

    fn restore_done(&self) -> bool {
        self.lock().restore_done
    }

    fn mark_restore_done(&mut self) {
        self.lock().restore_done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn capture_picks_latest_started_active_job() {
        let now = Utc::now();
        let older = JobRecord::new(JobId::from("a"), JobKind::Web, "https://a", now);
        let newer = JobRecord::new(
            JobId::from("b"),
            JobKind::Document,
            "b.pdf",
            now + Duration::seconds(1),
        );
        let lines = vec!["one".to_string()];

        let snapshot = CacheSnapshot::capture([&newer, &older], &lines);
        assert_eq!(snapshot.active_job_id, Some(JobId::from("b")));
        assert_eq!(snapshot.active_kind, Some(JobKind::Document));
        assert!(snapshot.is_running);
        assert_eq!(snapshot.log_lines, lines);
    }

    #[test]
    fn capture_ignores_terminal_jobs() {
        let mut done = JobRecord::new(JobId::from("a"), JobKind::Web, "https://a", Utc::now());
        done.status = crate::JobStatus::Complete;
        let snapshot = CacheSnapshot::capture([&done], &Vec::new());
        assert_eq!(snapshot.running_job(), None);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn id_without_running_flag_is_not_running() {
        let snapshot = CacheSnapshot {
            active_job_id: Some(JobId::from("x")),
            ..CacheSnapshot::default()
        };
        assert_eq!(snapshot.running_job(), None);
    }
}
