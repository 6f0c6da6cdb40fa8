use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cache directory missing or not writable: {0}")]
    CacheDir(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the cache directory exists; create if missing.
pub fn ensure_cache_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::CacheDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` via a temp file and rename.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_cache_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // Renames over any existing file.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Serializes `value` as pretty RON and writes it atomically.
    pub fn write_ron<T: serde::Serialize>(
        &self,
        filename: &str,
        value: &T,
    ) -> Result<PathBuf, PersistError> {
        let content = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::new())
            .map_err(|e| PersistError::Serialize(e.to_string()))?;
        self.write(filename, &content)
    }

    /// Removes `{dir}/{filename}`; a missing file is not an error.
    pub fn remove(&self, filename: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.dir.join(filename)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PersistError::Io(err)),
        }
    }
}
