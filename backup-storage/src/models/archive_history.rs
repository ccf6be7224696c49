use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const HISTORY_FILE_NAME: &str = "stored_archives.json";

/// Target identifier → stored archive paths, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveHistory {
    targets: BTreeMap<String, Vec<String>>,
}

impl ArchiveHistory {
    /// Read the history file; an absent file is an empty history.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Archive history not found, starting empty");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Rewrite the history file through a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let written = std::fs::write(&tmp, content).and_then(|()| std::fs::rename(&tmp, path));
        if written.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        written.map_err(StorageError::from)
    }

    pub fn archives(&self, target: &str) -> &[String] {
        self.targets.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn entry(&mut self, target: &str) -> &mut Vec<String> {
        self.targets.entry(target.to_string()).or_default()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}
