use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scan_logging::scan_info;

use crate::view_model::{JobRowView, TrackerViewModel};
use crate::{
    JobId, JobKind, JobOutcome, JobPatch, JobRegistry, ProgressReporter, SnapshotStore,
    SubmitRejection, TrackerSettings,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReconcilePhase {
    #[default]
    NotStarted,
    AwaitingActive {
        job_id: JobId,
        kind: Option<JobKind>,
        log_lines: Vec<String>,
    },
    AwaitingRestore,
    Done,
}

impl ReconcilePhase {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ReconcilePhase::AwaitingActive { .. } | ReconcilePhase::AwaitingRestore
        )
    }
}

/// Everything the lifecycle tracker owns. Only `update` mutates it.
#[derive(Debug)]
pub struct TrackerState {
    pub(crate) registry: JobRegistry,
    pub(crate) progress: ProgressReporter,
    pub(crate) settings: TrackerSettings,
    pub(crate) reconcile: ReconcilePhase,
    pub(crate) rng: StdRng,
    pub(crate) last_rejection: Option<SubmitRejection>,
    pub(crate) cancels_in_flight: HashSet<JobId>,
    /// Jobs submitted in this session whose submit reply has not arrived.
    pub(crate) submits_in_flight: HashSet<JobId>,
    dirty: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::build(TrackerSettings::default(), StdRng::seed_from_u64(0))
    }
}

impl TrackerState {
    pub fn new(settings: TrackerSettings) -> Self {
        Self::build(settings, StdRng::from_os_rng())
    }

    /// Deterministic variant for tests and replays.
    pub fn with_seed(settings: TrackerSettings, seed: u64) -> Self {
        Self::build(settings, StdRng::seed_from_u64(seed))
    }

    fn build(settings: TrackerSettings, rng: StdRng) -> Self {
        Self {
            registry: JobRegistry::new(settings.log_capacity),
            progress: ProgressReporter::new(&settings),
            settings,
            reconcile: ReconcilePhase::NotStarted,
            rng,
            last_rejection: None,
            cancels_in_flight: HashSet::new(),
            submits_in_flight: HashSet::new(),
            dirty: false,
        }
    }

    /// Attaches the durable mirror to the registry.
    pub fn with_mirror(mut self, mirror: Box<dyn SnapshotStore>) -> Self {
        let registry = std::mem::take(&mut self.registry);
        self.registry = registry.with_mirror(mirror);
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn reconcile_phase(&self) -> &ReconcilePhase {
        &self.reconcile
    }

    pub fn view(&self) -> TrackerViewModel {
        let jobs = self
            .registry
            .iter()
            .map(|job| JobRowView {
                job_id: job.id.clone(),
                kind: job.kind,
                status: job.status,
                subject_label: job.subject_label.clone(),
                message: job.message_text().to_string(),
                percent: self.progress.percent(&job.id).unwrap_or(0),
                outcome: job.outcome,
                result_summary: job.result_summary.clone(),
                cancelling: self.cancels_in_flight.contains(&job.id),
                display_only: job.display_only,
            })
            .collect();

        TrackerViewModel {
            reconciling: self.reconcile.is_pending(),
            any_active: self.registry.is_any_active(),
            jobs,
            log_lines: self.registry.log_lines().cloned().collect(),
            last_rejection: self.last_rejection.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets it.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Applies a patch and keeps the progress reporter and log in step.
    pub(crate) fn apply_patch(&mut self, id: &JobId, patch: &JobPatch, now: DateTime<Utc>) -> bool {
        if !self.registry.update(id, patch, now) {
            return false;
        }
        self.mark_dirty();

        let Some(job) = self.registry.get(id) else {
            return true;
        };
        self.progress.observe(job);
        if job.is_terminal() {
            let line = match job.outcome {
                Some(JobOutcome::Completed) => format!("{} scan {} complete", job.kind, job.id),
                Some(JobOutcome::Cancelled) => format!("{} scan {} cancelled", job.kind, job.id),
                _ => format!(
                    "{} scan {} failed: {}",
                    job.kind,
                    job.id,
                    job.message_text()
                ),
            };
            scan_info!("{}", line);
            self.registry.append_log(line);
        }
        true
    }

    pub(crate) fn forget(&mut self, id: &JobId) {
        self.progress.forget(id);
        self.cancels_in_flight.remove(id);
        self.submits_in_flight.remove(id);
    }
}
