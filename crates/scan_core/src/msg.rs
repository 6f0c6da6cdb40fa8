use chrono::{DateTime, Utc};

use crate::{HistoryEntry, JobId, JobKind, RemoteError, StatusReply, SubmitReply};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Session start; runs the reconciler. Sent once by the owner.
    SessionStarted,
    /// History answer for the snapshot's supposedly running job.
    ActiveHistoryLoaded(Result<Vec<HistoryEntry>, RemoteError>),
    /// History answer for the one-shot completed-job restore.
    CompletedHistoryLoaded(Result<Vec<HistoryEntry>, RemoteError>),
    /// A consumer asked for a new scan.
    SubmitRequested {
        kind: JobKind,
        subject_label: String,
        payload: String,
        now: DateTime<Utc>,
    },
    /// Executor answer to a submit.
    SubmitFinished {
        job_id: JobId,
        result: Result<SubmitReply, RemoteError>,
        now: DateTime<Utc>,
    },
    /// Executor answer to a status poll.
    StatusReported {
        job_id: JobId,
        result: Result<StatusReply, RemoteError>,
        now: DateTime<Utc>,
    },
    /// Time to poll active web jobs.
    PollTick,
    /// User asked to abort a job.
    CancelRequested { job_id: JobId },
    /// Executor answer to an abort request.
    CancelFinished {
        job_id: JobId,
        result: Result<(), RemoteError>,
        now: DateTime<Utc>,
    },
    /// The owning view dropped a record.
    Dismissed { job_id: JobId },
    /// Synthetic progress tick; also sweeps expired records.
    ProgressTick { now: DateTime<Utc> },
    /// Completion-phase progress tick.
    FinishTick,
    /// Fallback for placeholder wiring.
    NoOp,
}
