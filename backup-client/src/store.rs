//! Metadata store: which descriptor file records each target's last-known state.
//!
//! Persisted as a JSON object `{ "<target path>": "<descriptor file name>" }`.
//! Targets that were never backed up are absent from the object.

use crate::fs::atomic::atomic_write;
use crate::utils::errors::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A target paired with its stored descriptor name, if it has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    pub descriptor: Option<String>,
}

#[derive(Debug)]
pub struct MetadataStore {
    dir: PathBuf,
    file: PathBuf,
    entries: BTreeMap<String, String>,
}

impl MetadataStore {
    /// Load the store from `dir/file_name`, creating an empty one if absent.
    pub fn load(dir: &Path, file_name: &str) -> Result<Self> {
        let file = dir.join(file_name);

        let entries = if file.exists() {
            let content = std::fs::read_to_string(&file)?;
            serde_json::from_str(&content)?
        } else {
            warn!(path = %file.display(), "Metadata store not found, creating new");
            std::fs::create_dir_all(dir)?;
            atomic_write(&file, b"{}")?;
            BTreeMap::new()
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            file,
            entries,
        })
    }

    /// Pair every current target with its descriptor and drop entries for
    /// targets that left the list, deleting their descriptor files.
    pub fn resolve(&mut self, targets: &[PathBuf]) -> Vec<ResolvedTarget> {
        let current: Vec<String> = targets.iter().map(|t| key(t)).collect();

        let orphaned: Vec<String> = self
            .entries
            .keys()
            .filter(|k| !current.contains(k))
            .cloned()
            .collect();

        for target in orphaned {
            if let Some(descriptor) = self.entries.remove(&target) {
                warn!(target = %target, descriptor = %descriptor, "Removing metadata descriptor of dropped target");
                let descriptor_path = self.dir.join(&descriptor);
                if let Err(e) = std::fs::remove_file(&descriptor_path) {
                    warn!(path = %descriptor_path.display(), "Failed to delete descriptor: {}", e);
                }
            }
        }

        targets
            .iter()
            .map(|t| ResolvedTarget {
                path: t.clone(),
                descriptor: self.entries.get(&key(t)).cloned(),
            })
            .collect()
    }

    /// Record the descriptor file used for `target`.
    pub fn assign(&mut self, target: &Path, descriptor: &str) {
        self.entries.insert(key(target), descriptor.to_string());
    }

    #[cfg(test)]
    fn descriptor(&self, target: &Path) -> Option<&str> {
        self.entries.get(&key(target)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the store file atomically.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec(&self.entries)?;
        atomic_write(&self.file, &json)?;
        info!(path = %self.file.display(), entries = self.len(), "Metadata store saved");
        Ok(())
    }
}

fn key(target: &Path) -> String {
    target.to_string_lossy().into_owned()
}
