//! Directory snapshots: structural and temporal fingerprints of a watched tree.
//!
//! A snapshot is persisted as a descriptor file (JSON) next to the metadata
//! store and compared against a fresh walk on the next run.

use crate::fs::atomic::atomic_write;
use crate::fs::walker::walk_tree;
use crate::utils::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::path::Path;

/// One file entry, serialized as `[relpath, mtime, size]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry(pub String, pub String, pub String);

impl FileEntry {
    pub fn path(&self) -> &str {
        &self.0
    }

    pub fn modified(&self) -> &str {
        &self.1
    }

    pub fn size(&self) -> &str {
        &self.2
    }
}

/// Observable state of one watched directory at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Base name of the directory
    #[serde(rename = "directory")]
    pub name: String,

    /// Absolute path of the directory
    pub path: String,

    /// Parent of `path`
    pub parent: String,

    /// Hex SHA-512 over name, subdirs and file stamps
    pub hash: String,

    pub subdirs: Vec<String>,

    pub files: Vec<FileEntry>,
}

impl DirectorySnapshot {
    /// Walk `path` and fingerprint its current state.
    pub fn build(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(AgentError::NotADirectory(path.to_path_buf()));
        }

        let absolute = std::path::absolute(path)?;
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = absolute
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let listing = walk_tree(&absolute)?;
        let files: Vec<FileEntry> = listing
            .files
            .into_iter()
            .map(|f| FileEntry(f.relative_path, f.stamp.modified, f.stamp.size.to_string()))
            .collect();
        let hash = compute_hash(&name, &listing.subdirs, &files);

        Ok(Self {
            name,
            path: absolute.to_string_lossy().into_owned(),
            parent,
            hash,
            subdirs: listing.subdirs,
            files,
        })
    }

    /// Read a previously saved descriptor.
    pub fn load_stored(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the descriptor, replacing any previous one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        atomic_write(path, &json)?;
        Ok(())
    }
}

impl PartialEq for DirectorySnapshot {
    /// The hash only short-circuits inequality; equal hashes are always
    /// confirmed against the full listing.
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.subdirs == other.subdirs && self.files == other.files
    }
}

impl Eq for DirectorySnapshot {}

fn compute_hash(name: &str, subdirs: &[String], files: &[FileEntry]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(name.as_bytes());
    for subdir in subdirs {
        hasher.update(subdir.as_bytes());
    }
    for file in files {
        hasher.update(file.path().as_bytes());
        hasher.update(file.modified().as_bytes());
        hasher.update(file.size().as_bytes());
    }
    hex::encode(hasher.finalize())
}
