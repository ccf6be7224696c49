//! Archive pipeline - Produces a compressed artifact and checksum sidecar for
//! one changed target.
//!
//! Artifacts are named `<basename>-<timestamp>.<ext>`. The storage host splits
//! the name at the first `-` to recover the target, so the timestamp is
//! mandatory and must not contain a path separator.

pub mod archiver;
pub mod digest;

use crate::utils::errors::{AgentError, Result};
use archiver::Archiver;
use digest::{sidecar_line, Digester};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Compressed archive plus its checksum sidecar, both in the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub archive: PathBuf,
    pub sidecar: PathBuf,
}

impl ArchiveArtifact {
    pub fn archive_name(&self) -> String {
        file_name(&self.archive)
    }
}

/// Removes the wrapped file when dropped, whichever way the scope is left
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.0.display(), "Failed to remove intermediate package: {}", e),
        }
    }
}

pub struct ArchivePipeline<'a> {
    archiver: &'a dyn Archiver,
    digester: &'a dyn Digester,
    work_dir: &'a Path,
}

impl<'a> ArchivePipeline<'a> {
    pub fn new(archiver: &'a dyn Archiver, digester: &'a dyn Digester, work_dir: &'a Path) -> Self {
        Self {
            archiver,
            digester,
            work_dir,
        }
    }

    /// Archive `target`, stamping the artifact name with `timestamp`.
    pub fn run(&self, target: &Path, timestamp: &str) -> Result<ArchiveArtifact> {
        let base = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AgentError::Archive(format!("{} has no base name", target.display())))?;
        if timestamp.trim().is_empty() || timestamp.contains(|c: char| c == '/' || c == '\\') {
            return Err(AgentError::Archive(format!(
                "timestamp {:?} can not be part of an archive name",
                timestamp
            )));
        }
        let stem = format!("{}-{}", base, timestamp);

        std::fs::create_dir_all(self.work_dir)?;
        let package = self
            .work_dir
            .join(format!("{}.{}", stem, self.archiver.package_extension()));
        let archive = self
            .work_dir
            .join(format!("{}.{}", stem, self.archiver.artifact_extension()));
        let sidecar = self
            .work_dir
            .join(format!("{}.{}", stem, self.digester.sidecar_extension()));

        info!(target = %target.display(), archive = %archive.display(), "Creating archive");

        {
            let _package_guard = ScratchFile(package.clone());
            self.archiver.pack(target, &package)?;
            if let Err(e) = self.archiver.compress(&package, &archive) {
                discard(&archive);
                return Err(e);
            }
        }

        let checksum = match self.digester.digest_file(&archive) {
            Ok(checksum) => checksum,
            Err(e) => {
                discard(&archive);
                return Err(AgentError::Archive(format!(
                    "checksum of {} failed: {}",
                    archive.display(),
                    e
                )));
            }
        };

        if let Err(e) = std::fs::write(&sidecar, sidecar_line(&checksum, &file_name(&archive))) {
            discard(&archive);
            discard(&sidecar);
            return Err(AgentError::Archive(format!(
                "cannot write sidecar {}: {}",
                sidecar.display(),
                e
            )));
        }

        info!(archive = %archive.display(), sidecar = %sidecar.display(), "Archive ready");

        Ok(ArchiveArtifact { archive, sidecar })
    }
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove incomplete output: {}", e);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
