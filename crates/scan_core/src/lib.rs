//! Scan core: pure lifecycle state machine for tracked accessibility scans.
mod cancel;
mod effect;
mod error;
mod job;
mod msg;
mod progress;
pub mod reconcile;
mod registry;
mod remote;
mod settings;
mod snapshot;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use error::{FailureKind, RemoteError, SubmitRejection};
pub use job::{JobId, JobKind, JobOutcome, JobPatch, JobRecord, JobStatus};
pub use msg::Msg;
pub use progress::{exact_percent, ProgressPhase, ProgressReporter};
pub use registry::{JobRegistry, RegistryChange, SubscriptionId, DEFAULT_LOG_CAPACITY};
pub use remote::{HistoryEntry, HistoryFilter, StatusReply, SubmitReply, SubmitRequest};
pub use settings::TrackerSettings;
pub use snapshot::{CacheSnapshot, MemorySnapshotStore, SnapshotStore};
pub use state::{ReconcilePhase, TrackerState};
pub use update::{update, validate_subject};
pub use view_model::{JobRowView, TrackerViewModel};
