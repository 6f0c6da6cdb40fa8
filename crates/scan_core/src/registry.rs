//! In-memory registry of tracked jobs.
//!
//! The registry is the single source of truth shared by every consumer. All
//! mutation goes through `add`, `update`, `remove` and the log helpers; each
//! call that changes something rewrites the mirror snapshot and notifies
//! subscribers before it returns.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use scan_logging::{scan_debug, scan_trace};

use crate::{CacheSnapshot, JobId, JobPatch, JobRecord, SnapshotStore};

pub const DEFAULT_LOG_CAPACITY: usize = 200;

pub type SubscriptionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(JobId),
    Updated(JobId),
    Removed(JobId),
    LogAppended,
    LogCleared,
}

type Listener = Box<dyn Fn(&RegistryChange) + Send>;

pub struct JobRegistry {
    jobs: IndexMap<JobId, JobRecord>,
    log: VecDeque<String>,
    log_capacity: usize,
    mirror: Option<Box<dyn SnapshotStore>>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    // Fallback restore guard when no mirror is attached.
    restore_done: bool,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.jobs)
            .field("log_lines", &self.log.len())
            .field("mirrored", &self.mirror.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl JobRegistry {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            jobs: IndexMap::new(),
            log: VecDeque::new(),
            log_capacity: log_capacity.max(1),
            mirror: None,
            listeners: Vec::new(),
            next_subscription: 1,
            restore_done: false,
        }
    }

    /// Attaches the durable mirror. Nothing is written until the next mutation.
    pub fn with_mirror(mut self, mirror: Box<dyn SnapshotStore>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn mirror(&self) -> Option<&dyn SnapshotStore> {
        self.mirror.as_deref()
    }

    /// Inserts a record. Returns `false` (and does nothing) if the id exists.
    pub fn add(&mut self, job: JobRecord) -> bool {
        if self.jobs.contains_key(&job.id) {
            scan_debug!("Ignoring duplicate add for job {}", job.id);
            return false;
        }
        let id = job.id.clone();
        self.jobs.insert(id.clone(), job);
        self.changed(RegistryChange::Added(id));
        true
    }

    /// Merges `patch` into an existing record.
    ///
    /// Unknown ids, terminal records and stale lower-ranked statuses are all
    /// no-ops; the return value says whether the record changed.
    pub fn update(&mut self, id: &JobId, patch: &JobPatch, now: DateTime<Utc>) -> bool {
        let Some(job) = self.jobs.get_mut(id) else {
            scan_trace!("Update for unknown job {} dropped", id);
            return false;
        };
        if !job.merge(patch, now) {
            scan_trace!("Update for job {} had no effect", id);
            return false;
        }
        self.changed(RegistryChange::Updated(id.clone()));
        true
    }

    pub fn remove(&mut self, id: &JobId) -> Option<JobRecord> {
        let removed = self.jobs.shift_remove(id)?;
        self.changed(RegistryChange::Removed(id.clone()));
        Some(removed)
    }

    pub fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    /// All records in insertion order.
    pub fn list(&self) -> Vec<&JobRecord> {
        self.jobs.values().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_any_active(&self) -> bool {
        self.jobs.values().any(|job| !job.is_terminal())
    }

    pub fn log_lines(&self) -> impl Iterator<Item = &String> {
        self.log.iter()
    }

    pub fn append_log(&mut self, line: impl Into<String>) {
        self.log.push_back(line.into());
        while self.log.len() > self.log_capacity {
            self.log.pop_front();
        }
        self.changed(RegistryChange::LogAppended);
    }

    /// Replaces the log buffer, keeping at most the newest `log_capacity` lines.
    pub fn replace_log(&mut self, lines: Vec<String>) {
        let skip = lines.len().saturating_sub(self.log_capacity);
        self.log = lines.into_iter().skip(skip).collect();
        self.changed(RegistryChange::LogAppended);
    }

    pub fn clear_log(&mut self) {
        if self.log.is_empty() {
            return;
        }
        self.log.clear();
        self.changed(RegistryChange::LogCleared);
    }

    /// Removes terminal records whose grace period has elapsed at `now`.
    ///
    /// Display-only records stay until dismissed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>, grace: chrono::Duration) -> Vec<JobId> {
        let expired: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| !job.display_only)
            .filter(|job| match job.finished_at {
                Some(finished) => job.is_terminal() && now - finished >= grace,
                None => false,
            })
            .map(|job| job.id.clone())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        expired
    }

    /// Removes every terminal record regardless of its grace period.
    pub fn remove_terminal(&mut self) -> Vec<JobId> {
        let terminal: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| job.is_terminal())
            .map(|job| job.id.clone())
            .collect();
        for id in &terminal {
            self.remove(id);
        }
        terminal
    }

    pub fn subscribe(&mut self, listener: impl Fn(&RegistryChange) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn restore_done(&self) -> bool {
        match self.mirror.as_deref() {
            Some(mirror) => mirror.restore_done(),
            None => self.restore_done,
        }
    }

    pub fn mark_restore_done(&mut self) {
        self.restore_done = true;
        if let Some(mirror) = self.mirror.as_deref_mut() {
            mirror.mark_restore_done();
        }
    }

    /// Rewrites the mirror from the current registry state. With nothing
    /// running the snapshot is cleared, log lines included.
    pub fn persist_snapshot(&mut self) {
        let snapshot = CacheSnapshot::capture(self.jobs.values(), self.log.iter());
        if let Some(mirror) = self.mirror.as_deref_mut() {
            if snapshot.running_job().is_none() {
                mirror.clear();
            } else {
                mirror.save(&snapshot);
            }
        }
    }

    fn changed(&mut self, change: RegistryChange) {
        self.persist_snapshot();
        for (_, listener) in &self.listeners {
            listener(&change);
        }
    }
}
