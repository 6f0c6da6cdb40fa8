//! Scan engine: HTTP client, durable file cache and effect execution.
mod cache;
mod client;
mod engine;
mod persist;
mod session;
mod types;

pub use cache::{FileSnapshotStore, CACHE_FILENAME, SESSION_FILENAME};
pub use client::{ClientSettings, HistoryStore, HttpScanClient, ScanExecutor};
pub use engine::{EngineHandle, MsgSender};
pub use persist::{ensure_cache_dir, AtomicFileWriter, PersistError};
pub use scan_core::{FailureKind, RemoteError};
pub use session::ScanSession;
pub use types::parse_status;
