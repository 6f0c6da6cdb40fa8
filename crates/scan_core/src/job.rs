use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_PREFIX: &str = "scan";
const ID_SUFFIX_LEN: usize = 8;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque job token: `scan-<unix millis>-<random base36 suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh id for a submission made at `now`.
    pub fn generate<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
            .collect();
        Self(format!(
            "{ID_PREFIX}-{}-{suffix}",
            now.timestamp_millis().max(0)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Web,
    Document,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Web => "web",
            JobKind::Document => "document",
        }
    }

    /// Status a job of this kind enters once the executor accepts it.
    pub fn running_status(self) -> JobStatus {
        match self {
            JobKind::Web => JobStatus::Crawling,
            JobKind::Document => JobStatus::Scanning,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Crawling,
    Scanning,
    Analyzing,
    Complete,
    Error,
}

impl JobStatus {
    /// Precedence used to drop out-of-order replies. Terminal statuses share
    /// the top rank so neither can displace the other.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Crawling | JobStatus::Scanning => 1,
            JobStatus::Analyzing => 2,
            JobStatus::Complete | JobStatus::Error => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Crawling => "crawling",
            JobStatus::Scanning => "scanning",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a terminal record ended. `Error` covers both failures and cancellations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub current_unit: u32,
    /// Zero means the unit count is unknown.
    pub total_units: u32,
    pub message: Option<String>,
    pub subject_label: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<JobOutcome>,
    pub result_summary: Option<String>,
    /// Restored from history for display; never swept by the grace period.
    pub display_only: bool,
}

impl JobRecord {
    pub fn new(
        id: JobId,
        kind: JobKind,
        subject_label: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Queued,
            current_unit: 0,
            total_units: 0,
            message: None,
            subject_label: subject_label.into(),
            started_at,
            finished_at: None,
            outcome: None,
            result_summary: None,
            display_only: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn units_known(&self) -> bool {
        self.total_units > 0
    }

    pub fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// Merges `patch` into the record. Returns whether anything changed.
    ///
    /// Terminal records ignore every patch, and a patch whose status ranks
    /// below the current one is a stale reply and is dropped whole.
    pub(crate) fn merge(&mut self, patch: &JobPatch, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        if let Some(status) = patch.status {
            if status.rank() < self.status.rank() {
                return false;
            }
        }

        let before = self.clone();

        if let Some(total) = patch.total_units {
            self.total_units = total;
        }
        if let Some(current) = patch.current_unit {
            self.current_unit = current;
        }
        if let Some(message) = &patch.message {
            self.message = Some(message.clone());
        }
        if let Some(summary) = &patch.result_summary {
            self.result_summary = Some(summary.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
            if status.is_terminal() {
                self.finished_at = Some(now);
                self.outcome = Some(patch.outcome.unwrap_or(match status {
                    JobStatus::Complete => JobOutcome::Completed,
                    _ => JobOutcome::Failed,
                }));
                if status == JobStatus::Complete && self.units_known() {
                    self.current_unit = self.total_units;
                }
            }
        }
        if self.units_known() && self.current_unit > self.total_units {
            self.current_unit = self.total_units;
        }

        *self != before
    }
}

/// Partial update for a record; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub current_unit: Option<u32>,
    pub total_units: Option<u32>,
    pub message: Option<String>,
    pub result_summary: Option<String>,
    pub outcome: Option<JobOutcome>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Terminal patch applied when the executor confirms an abort.
    pub fn cancelled() -> Self {
        Self {
            status: Some(JobStatus::Error),
            outcome: Some(JobOutcome::Cancelled),
            message: Some("Cancelled by user".to_string()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            outcome: Some(JobOutcome::Failed),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_units(mut self, current: u32, total: u32) -> Self {
        self.current_unit = Some(current);
        self.total_units = Some(total);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
