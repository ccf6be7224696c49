//! Change detection: decides whether a target needs a new archive.
//!
//! The fresh snapshot is written over the stored descriptor as soon as the
//! decision is made (write-after-decide). If archiving fails afterwards the
//! target is not retried on the next run unless it changes again.

use crate::snapshot::DirectorySnapshot;
use crate::utils::errors::{AgentError, Result};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Suffix appended to a target's base name to form its descriptor file name
pub const DESCRIPTOR_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No prior state was recorded
    New,
    /// Stored state differs from the tree on disk
    Changed,
    /// Stored state matches the tree on disk
    Unchanged,
}

impl Classification {
    pub fn needs_backup(self) -> bool {
        !matches!(self, Classification::Unchanged)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::New => "new",
            Classification::Changed => "changed",
            Classification::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub classification: Classification,

    /// Descriptor file name the target's state is stored under
    pub descriptor: String,
}

/// Descriptor file name for a target that has none yet
pub fn descriptor_name(target: &Path) -> String {
    let base = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    format!("{}{}", base, DESCRIPTOR_SUFFIX)
}

/// Classify `target` against its stored descriptor in `metadata_dir`.
pub fn detect(target: &Path, stored: Option<&str>, metadata_dir: &Path) -> Result<Detection> {
    let current = DirectorySnapshot::build(target)?;

    let (classification, descriptor) = match stored {
        None => {
            info!(target = %target.display(), "Creating new directory description");
            (Classification::New, descriptor_name(target))
        }
        Some(descriptor) => match DirectorySnapshot::load_stored(&metadata_dir.join(descriptor)) {
            Ok(previous) if previous == current => (Classification::Unchanged, descriptor.to_string()),
            Ok(_) => (Classification::Changed, descriptor.to_string()),
            Err(AgentError::NotFound(path)) => {
                warn!(
                    target = %target.display(),
                    descriptor = %path.display(),
                    "Stored descriptor missing, treating target as new"
                );
                (Classification::New, descriptor.to_string())
            }
            Err(e) => return Err(e),
        },
    };

    if classification.needs_backup() {
        current.save(&metadata_dir.join(&descriptor))?;
        debug!(descriptor = %descriptor, "Descriptor saved");
    }

    info!(target = %target.display(), classification = %classification, "Change detection finished");

    Ok(Detection {
        classification,
        descriptor,
    })
}
