//! File-backed durable cache mirror.
//!
//! Two RON files live in the cache directory: the snapshot itself and a
//! small session file holding the one-shot restore guard. Keeping them apart
//! means clearing the snapshot never resets the guard.

use std::fs;
use std::path::{Path, PathBuf};

use scan_core::{CacheSnapshot, SnapshotStore};
use scan_logging::{scan_debug, scan_error, scan_warn};
use serde::{Deserialize, Serialize};

use crate::persist::AtomicFileWriter;

pub const CACHE_FILENAME: &str = "scan_cache.ron";
pub const SESSION_FILENAME: &str = "scan_session.ron";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PersistedSession {
    session: String,
    history_restored: bool,
}

/// [`SnapshotStore`] over two files in a cache directory.
///
/// The restore guard only counts for the session label it was written
/// under; a new label starts with the guard unset.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    writer: AtomicFileWriter,
    session: String,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
            session: String::new(),
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    fn read<T: serde::de::DeserializeOwned>(&self, filename: &str) -> Option<T> {
        let path = self.dir().join(filename);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                scan_warn!("Failed to read {:?}: {}", path, err);
                return None;
            }
        };
        match ron::from_str(&content) {
            Ok(value) => Some(value),
            Err(err) => {
                scan_warn!("Ignoring corrupt cache file {:?}: {}", path, err);
                None
            }
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Option<CacheSnapshot> {
        self.read::<CacheSnapshot>(CACHE_FILENAME)
    }

    fn save(&mut self, snapshot: &CacheSnapshot) {
        if let Err(err) = self.writer.write_ron(CACHE_FILENAME, snapshot) {
            scan_error!("Failed to write cache snapshot to {:?}: {}", self.dir(), err);
        }
    }

    fn clear(&mut self) {
        match self.writer.remove(CACHE_FILENAME) {
            Ok(()) => scan_debug!("Cleared cache snapshot in {:?}", self.dir()),
            Err(err) => scan_error!("Failed to clear cache snapshot in {:?}: {}", self.dir(), err),
        }
    }

    fn restore_done(&self) -> bool {
        self.read::<PersistedSession>(SESSION_FILENAME)
            .is_some_and(|stored| stored.session == self.session && stored.history_restored)
    }

    fn mark_restore_done(&mut self) {
        let stored = PersistedSession {
            session: self.session.clone(),
            history_restored: true,
        };
        if let Err(err) = self.writer.write_ron(SESSION_FILENAME, &stored) {
            scan_error!("Failed to write session guard to {:?}: {}", self.dir(), err);
        }
    }
}
