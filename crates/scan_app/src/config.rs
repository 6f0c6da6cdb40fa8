//! Optional `scan_tracker.ron` settings file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use log::LevelFilter;
use scan_core::TrackerSettings;
use scan_engine::ClientSettings;
use scan_logging::LogDestination;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    pub log_to_terminal: bool,
    /// Fixed session label; a fresh one per launch when unset.
    pub session: Option<String>,
    pub tracker: TrackerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            base_url: client.base_url,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            cache_dir: PathBuf::from("./.scan_cache"),
            log_file: PathBuf::from(scan_logging::DEFAULT_LOG_FILE),
            log_level: "info".to_string(),
            log_to_terminal: false,
            session: None,
            tracker: TrackerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err).context("reading settings file"),
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        ron::from_str(content).context("parsing settings file")
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        if self.log_to_terminal {
            LogDestination::Both
        } else {
            LogDestination::File
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        scan_logging::parse_level(&self.log_level)
    }

    pub fn session_label(&self) -> String {
        self.session.clone().unwrap_or_else(|| {
            format!("run-{}-{}", std::process::id(), Utc::now().timestamp_millis())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_means_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(&temp.path().join("absent.ron")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.cache_dir, PathBuf::from("./.scan_cache"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::parse(
            r#"(
                base_url: "https://scanner.example.com/api",
                session: Some("fixed"),
                tracker: (grace_period_ms: 1000),
            )"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://scanner.example.com/api");
        assert_eq!(config.session_label(), "fixed");
        assert_eq!(config.tracker.grace_period_ms, 1000);
        assert_eq!(
            config.tracker.poll_interval_ms,
            TrackerSettings::default().poll_interval_ms
        );
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scan_tracker.ron");
        fs::write(&path, "(base_url: 42").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing settings file"));
    }

    #[test]
    fn log_settings_map_to_logger_setup() {
        let config = AppConfig {
            log_level: "debug".to_string(),
            log_to_terminal: true,
            ..AppConfig::default()
        };
        assert_eq!(config.log_level(), LevelFilter::Debug);
        assert_eq!(config.log_destination(), LogDestination::Both);
    }
}
