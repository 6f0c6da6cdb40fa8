use crate::{JobId, JobKind, SubmitRequest};

/// Side effects requested by `update`; the engine runs them and reports the
/// outcome back as a `Msg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    QueryActiveHistory {
        job_id: JobId,
        kind: Option<JobKind>,
    },
    QueryCompletedHistory,
    Submit(SubmitRequest),
    FetchStatus { job_id: JobId, kind: JobKind },
    Cancel { job_id: JobId },
}
