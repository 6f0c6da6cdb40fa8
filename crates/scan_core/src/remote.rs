//! Typed shapes of what the remote executor and history store exchange with
//! the tracker. Wire encoding lives in the engine; these are already
//! defaulted and validated.

use chrono::{DateTime, Utc};

use crate::{JobId, JobKind, JobOutcome, JobPatch, JobRecord, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub job_id: JobId,
    pub kind: JobKind,
    pub subject_label: String,
    /// Opaque payload handed to the executor (page options, document body).
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitReply {
    /// The executor queued the job and will report through status polls.
    Accepted { job_id: Option<JobId> },
    /// The job ran within the request (document scans).
    Completed {
        status: Option<JobStatus>,
        current_unit: Option<u32>,
        total_units: Option<u32>,
        result_summary: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReply {
    pub status: Option<JobStatus>,
    pub current_unit: Option<u32>,
    pub total_units: Option<u32>,
    pub message: Option<String>,
}

impl StatusReply {
    pub fn to_patch(&self) -> JobPatch {
        JobPatch {
            status: self.status,
            current_unit: self.current_unit,
            total_units: self.total_units,
            message: self.message.clone(),
            ..JobPatch::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub subject_label: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_summary: Option<String>,
}

impl HistoryEntry {
    pub fn is_in_progress(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn into_record(self, display_only: bool) -> JobRecord {
        let mut record = JobRecord::new(self.id, self.kind, self.subject_label, self.started_at);
        record.status = self.status;
        record.finished_at = self.finished_at;
        record.result_summary = self.result_summary;
        record.display_only = display_only;
        if self.status.is_terminal() {
            record.finished_at = record.finished_at.or(Some(record.started_at));
            record.outcome = Some(match self.status {
                JobStatus::Complete => JobOutcome::Completed,
                _ => JobOutcome::Failed,
            });
        }
        record
    }
}
