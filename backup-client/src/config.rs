//! Configuration management for the backup client.
//!
//! Loads configuration from a TOML file. Every section except `[archive]` and
//! `[log]` is mandatory; a missing one is reported as a configuration error
//! before any work starts.

use crate::utils::errors::{AgentError, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub targets: TargetsConfig,
    pub metadata: MetadataConfig,
    pub server: ServerConfig,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Newline-delimited list of directories to watch
    pub list_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Directory holding the metadata store and the per-target descriptors
    pub path: PathBuf,

    /// File name of the metadata store inside `path`
    #[serde(default = "default_dict_file_name")]
    pub dict_file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the storage host service
    pub url: String,

    /// MAC address used for Wake-on-LAN
    pub mac: String,

    /// Broadcast address the magic packet is sent to
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: String,

    /// Timeout for a single reachability probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Wait between the wake signal and the second probe
    #[serde(default = "default_wake_backoff_secs")]
    pub wake_backoff_secs: u64,

    /// Timeout for the ingest notification request
    #[serde(default = "default_trigger_timeout_secs")]
    pub trigger_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Mount point of the remote volume; `None` when the destination is always available
    #[serde(default)]
    pub mount_point: Option<PathBuf>,

    /// Directory archives are moved into
    pub path: PathBuf,

    /// File name of the manifest written into `path`
    #[serde(default = "default_manifest_file_name")]
    pub manifest_file_name: String,

    /// strftime format of the timestamp embedded in archive names
    #[serde(default = "default_file_name_timestamp_format")]
    pub file_name_timestamp_format: String,

    /// Timeout for mount and unmount commands
    #[serde(default = "default_mount_timeout_secs")]
    pub mount_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Working directory for archives before transfer (defaults to the metadata directory)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Compression level (1-22 for zstd)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_dict_file_name() -> String {
    "metadata.json".to_string()
}

fn default_broadcast_addr() -> String {
    "255.255.255.255:9".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_wake_backoff_secs() -> u64 {
    60
}

fn default_trigger_timeout_secs() -> u64 {
    10
}

fn default_manifest_file_name() -> String {
    "backup.lst".to_string()
}

fn default_file_name_timestamp_format() -> String {
    "%Y%m%d%H%M%S".to_string()
}

fn default_mount_timeout_secs() -> u64 {
    30
}

fn default_compression_level() -> i32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            compression_level: default_compression_level(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        crate::transfer::host::parse_mac(&self.server.mac)?;
        if self.server.url.trim().is_empty() {
            return Err(AgentError::Configuration("server.url is empty".into()));
        }
        if self.metadata.dict_file_name.trim().is_empty() {
            return Err(AgentError::Configuration("metadata.dict_file_name is empty".into()));
        }
        if self.destination.manifest_file_name.trim().is_empty() {
            return Err(AgentError::Configuration("destination.manifest_file_name is empty".into()));
        }
        let timestamp_format = &self.destination.file_name_timestamp_format;
        if StrftimeItems::new(timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(AgentError::Configuration(format!(
                "destination.file_name_timestamp_format {:?} is not a valid strftime format",
                timestamp_format
            )));
        }
        // The timestamp is what separates the target name from the rest of the
        // archive name, and it must stay inside one file name.
        let rendered = chrono::Utc::now().format(timestamp_format).to_string();
        if rendered.trim().is_empty() || rendered.contains(|c: char| c == '/' || c == '\\') {
            return Err(AgentError::Configuration(format!(
                "destination.file_name_timestamp_format {:?} renders {:?}, which is not usable in a file name",
                timestamp_format, rendered
            )));
        }
        if !(1..=22).contains(&self.archive.compression_level) {
            return Err(AgentError::Configuration(format!(
                "archive.compression_level {} out of range 1-22",
                self.archive.compression_level
            )));
        }
        Ok(())
    }

    /// Directory archives are produced in
    pub fn work_dir(&self) -> &Path {
        self.archive.work_dir.as_deref().unwrap_or(&self.metadata.path)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.server.probe_timeout_secs)
    }

    pub fn wake_backoff(&self) -> Duration {
        Duration::from_secs(self.server.wake_backoff_secs)
    }

    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_secs(self.server.trigger_timeout_secs)
    }

    pub fn mount_timeout(&self) -> Duration {
        Duration::from_secs(self.destination.mount_timeout_secs)
    }
}
