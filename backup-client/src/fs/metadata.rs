//! Per-file stamps recorded in directory snapshots.
//!
//! Modification times are kept as second-precision UTC text rather than raw
//! epoch numbers so a stored snapshot re-serializes byte for byte.

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::time::SystemTime;

/// Timestamp layout used for file modification times
pub const MTIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Size and modification time of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    /// Last modified time formatted with [`MTIME_FORMAT`]
    pub modified: String,

    /// File size in bytes
    pub size: u64,
}

impl FileStamp {
    pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        Ok(Self {
            modified: format_mtime(metadata.modified()?),
            size: metadata.len(),
        })
    }
}

/// Format a modification time at second precision in UTC
pub fn format_mtime(time: SystemTime) -> String {
    let utc: DateTime<Utc> = time.into();
    utc.format(MTIME_FORMAT).to_string()
}
