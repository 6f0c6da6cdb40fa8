//! Wire shapes of the executor and history endpoints.
//!
//! Every field is optional on the way in; conversion to the core types
//! applies the defaulting rules (absent units mean "unknown", unknown status
//! strings are treated as absent).

use chrono::{DateTime, Utc};
use scan_core::{
    HistoryEntry, JobId, JobKind, JobStatus, StatusReply, SubmitReply, SubmitRequest,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitBody<'a> {
    pub id: &'a str,
    pub kind: JobKind,
    pub subject_label: &'a str,
    pub payload: &'a str,
}

impl<'a> From<&'a SubmitRequest> for SubmitBody<'a> {
    fn from(request: &'a SubmitRequest) -> Self {
        Self {
            id: request.job_id.as_str(),
            kind: request.kind,
            subject_label: &request.subject_label,
            payload: &request.payload,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireSubmitReply {
    pub job_id: Option<String>,
    pub current_unit: Option<u32>,
    pub total_units: Option<u32>,
    pub status: Option<String>,
    pub result_summary: Option<String>,
}

impl WireSubmitReply {
    /// A bare `{jobId}` means "accepted, poll me"; anything carrying a
    /// status or counters is a synchronous result.
    pub fn into_reply(self, kind: JobKind) -> SubmitReply {
        let synchronous =
            self.status.is_some() || self.current_unit.is_some() || self.total_units.is_some();
        if !synchronous {
            return SubmitReply::Accepted {
                job_id: self.job_id.map(JobId::from),
            };
        }
        SubmitReply::Completed {
            status: self.status.as_deref().and_then(|raw| parse_status(raw, kind)),
            current_unit: self.current_unit,
            total_units: self.total_units,
            result_summary: self.result_summary,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireStatus {
    pub status: Option<String>,
    pub current_unit: Option<u32>,
    pub total_units: Option<u32>,
    pub message: Option<String>,
}

impl WireStatus {
    pub fn into_reply(self, kind: JobKind) -> StatusReply {
        StatusReply {
            status: self.status.as_deref().and_then(|raw| parse_status(raw, kind)),
            current_unit: self.current_unit,
            total_units: self.total_units,
            message: self.message,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireHistoryEntry {
    pub id: String,
    pub kind: JobKind,
    pub status: String,
    #[serde(default)]
    pub subject_label: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result_summary: Option<String>,
}

impl WireHistoryEntry {
    pub fn into_entry(self) -> Option<HistoryEntry> {
        let status = parse_status(&self.status, self.kind)?;
        Some(HistoryEntry {
            id: JobId::from(self.id),
            kind: self.kind,
            status,
            subject_label: self.subject_label,
            started_at: self.started_at,
            finished_at: self.finished_at,
            result_summary: self.result_summary,
        })
    }
}

/// Maps executor/history status strings onto the lifecycle statuses.
///
/// Generic "in progress" spellings map to the kind's running status.
pub fn parse_status(raw: &str, kind: JobKind) -> Option<JobStatus> {
    let status = match raw.trim().to_ascii_lowercase().as_str() {
        "queued" => JobStatus::Queued,
        "crawling" => JobStatus::Crawling,
        "scanning" => JobStatus::Scanning,
        "analyzing" | "analysing" => JobStatus::Analyzing,
        "in_progress" | "in-progress" | "running" | "pending" | "processing" => {
            kind.running_status()
        }
        "complete" | "completed" | "done" | "success" => JobStatus::Complete,
        "error" | "failed" | "cancelled" | "canceled" => JobStatus::Error,
        _ => return None,
    };
    Some(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_job_id_reply_is_accepted() {
        let wire: WireSubmitReply = serde_json::from_str(r#"{"jobId":"abc"}"#).unwrap();
        assert_eq!(
            wire.into_reply(JobKind::Web),
            SubmitReply::Accepted {
                job_id: Some(JobId::from("abc"))
            }
        );
    }

    #[test]
    fn counters_make_a_synchronous_result() {
        let wire: WireSubmitReply = serde_json::from_str(
            r#"{"currentUnit":1,"totalUnits":1,"status":"complete","resultSummary":"3 issues"}"#,
        )
        .unwrap();
        assert_eq!(
            wire.into_reply(JobKind::Document),
            SubmitReply::Completed {
                status: Some(JobStatus::Complete),
                current_unit: Some(1),
                total_units: Some(1),
                result_summary: Some("3 issues".to_string()),
            }
        );
    }

    #[test]
    fn partial_status_defaults_missing_fields() {
        let wire: WireStatus = serde_json::from_str(r#"{"status":"mystery"}"#).unwrap();
        assert_eq!(wire.into_reply(JobKind::Web), StatusReply::default());
    }

    #[test]
    fn in_progress_maps_to_kind_specific_status() {
        assert_eq!(parse_status("in_progress", JobKind::Web), Some(JobStatus::Crawling));
        assert_eq!(
            parse_status("RUNNING", JobKind::Document),
            Some(JobStatus::Scanning)
        );
        assert_eq!(parse_status("Cancelled", JobKind::Web), Some(JobStatus::Error));
    }
}
