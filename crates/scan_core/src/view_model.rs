use crate::{JobId, JobKind, JobOutcome, JobStatus, SubmitRejection};

/// Read-only projection handed to consumers (status banner, upload panel,
/// history panel).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackerViewModel {
    pub reconciling: bool,
    pub any_active: bool,
    pub jobs: Vec<JobRowView>,
    pub log_lines: Vec<String>,
    pub last_rejection: Option<SubmitRejection>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub subject_label: String,
    pub message: String,
    pub percent: u8,
    pub outcome: Option<JobOutcome>,
    pub result_summary: Option<String>,
    pub cancelling: bool,
    pub display_only: bool,
}

impl TrackerViewModel {
    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| !job.status.is_terminal())
            .count()
    }

    /// One-line summary for the status banner.
    pub fn banner(&self) -> String {
        if self.reconciling {
            return "Checking previous session...".to_string();
        }
        match self.active_count() {
            0 if self.jobs.is_empty() => "Idle".to_string(),
            0 => format!("Idle | Recent: {}", self.jobs.len()),
            1 => "Scanning: 1 job".to_string(),
            n => format!("Scanning: {n} jobs"),
        }
    }
}
