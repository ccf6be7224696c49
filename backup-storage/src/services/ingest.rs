//! Manifest ingest: verify every archive the client shipped and hand the good
//! ones to retention.

use crate::config::AppConfig;
use crate::error::StorageError;
use crate::models::archive_history::ArchiveHistory;
use crate::services::digest::{read_sidecar_digest, sha512_file, sidecar_path};
use crate::services::retention::RetentionEngine;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    /// Archive paths added to the history
    pub verified: Vec<String>,
    /// Archives deleted for failing verification
    pub rejected: Vec<String>,
    /// Entries left alone: unknown target, missing archive, unreadable file
    pub skipped: Vec<String>,
    pub evicted: Vec<String>,
}

/// Target identifier of an archive name: everything before the first `-`
pub fn target_identity(name: &str) -> Option<&str> {
    match name.split_once('-') {
        Some((identity, _)) if !identity.is_empty() => Some(identity),
        _ => None,
    }
}

pub struct IngestVerifier<'a> {
    config: &'a AppConfig,
}

impl<'a> IngestVerifier<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    /// Consume the pending manifest, if any.
    pub fn run(&self) -> Result<Option<IngestReport>, StorageError> {
        let manifest = self.config.manifest_path();
        let content = match std::fs::read_to_string(&manifest) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut report = IngestReport {
            started_at: Utc::now(),
            verified: Vec::new(),
            rejected: Vec::new(),
            skipped: Vec::new(),
            evicted: Vec::new(),
        };

        let history_path = self.config.history_path();
        let mut history = ArchiveHistory::load(&history_path)?;
        let retention = RetentionEngine::new(
            self.config.retention_depth,
            &self.config.archive_extension,
            &self.config.sidecar_extension,
        );

        for name in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some(identity) = self.identity_of(name) else {
                report.skipped.push(name.to_string());
                continue;
            };

            let archive = self.config.backup_root.join(name);
            let sidecar = self.sidecar_of(&archive);

            match verify(&archive, &sidecar) {
                Ok(()) => {
                    let stored = archive.display().to_string();
                    tracing::info!(identity, archive = %stored, "Checksum verified");
                    report.evicted.extend(retention.record(&mut history, identity, &stored));
                    tracing::debug!(identity, kept = history.archives(identity).len(), "History updated");
                    report.verified.push(stored);
                }
                Err(StorageError::Verification(reason)) => {
                    tracing::error!(archive = %archive.display(), "Verification failed: {}", reason);
                    discard(&archive);
                    discard(&sidecar);
                    report.rejected.push(name.to_string());
                }
                Err(e) => {
                    tracing::error!(archive = %archive.display(), "Can not verify archive: {}", e);
                    report.skipped.push(name.to_string());
                }
            }
        }

        history.save(&history_path)?;
        std::fs::remove_file(&manifest)?;

        tracing::info!(
            started_at = %report.started_at,
            targets = history.len(),
            verified = report.verified.len(),
            rejected = report.rejected.len(),
            skipped = report.skipped.len(),
            evicted = report.evicted.len(),
            "Ingest finished"
        );
        Ok(Some(report))
    }

    fn identity_of<'n>(&self, name: &'n str) -> Option<&'n str> {
        if name.contains('/') || name.contains('\\') {
            tracing::warn!(entry = name, "Manifest entry is not a plain file name, skipping");
            return None;
        }
        let identity = target_identity(name);
        if identity.is_none() {
            tracing::warn!(entry = name, "Archive name carries no target identifier, skipping");
        }
        identity
    }

    fn sidecar_of(&self, archive: &Path) -> PathBuf {
        sidecar_path(
            archive,
            &self.config.archive_extension,
            &self.config.sidecar_extension,
        )
    }
}

fn verify(archive: &Path, sidecar: &Path) -> Result<(), StorageError> {
    if !archive.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", archive.display()),
        )
        .into());
    }

    let expected = read_sidecar_digest(sidecar)?;
    let actual = sha512_file(archive)?;
    if actual != expected {
        return Err(StorageError::Verification(format!(
            "{} digest {} does not match {}",
            archive.display(),
            actual,
            expected
        )));
    }
    Ok(())
}

fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "File deleted"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to delete file: {}", e),
    }
}

/// Run one ingest under the state's lock, off the async runtime.
pub async fn ingest_pending(state: Arc<AppState>) -> anyhow::Result<Option<IngestReport>> {
    let _guard = state.ingest_lock.lock().await;
    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || IngestVerifier::new(&config).run()).await??;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use tempfile::TempDir;

    fn ship(root: &Path, name: &str, content: &[u8]) {
        let archive = root.join(format!("{}.tar.zst", name));
        std::fs::write(&archive, content).unwrap();
        let digest = sha512_file(&archive).unwrap();
        std::fs::write(
            root.join(format!("{}.sha512", name)),
            format!("{}  {}.tar.zst\n", digest, name),
        )
        .unwrap();
    }

    fn write_manifest(root: &Path, names: &[&str]) {
        let lines: Vec<String> = names.iter().map(|n| format!("{}.tar.zst", n)).collect();
        std::fs::write(root.join("backup.lst"), lines.join("\n")).unwrap();
    }

    fn stored(root: &Path, name: &str) -> String {
        root.join(format!("{}.tar.zst", name)).display().to_string()
    }

    #[test]
    fn identity_is_prefix_before_first_dash() {
        assert_eq!(target_identity("photos-20260101.tar.zst"), Some("photos"));
        assert_eq!(target_identity("my-photos-20260101.tar.zst"), Some("my"));
        assert_eq!(target_identity("photos.tar.zst"), None);
        assert_eq!(target_identity("-1.tar.zst"), None);
    }

    #[test]
    fn no_manifest_is_noop() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);
        assert!(IngestVerifier::new(&config).run().unwrap().is_none());
        assert!(!config.history_path().exists());
    }

    #[test]
    fn two_targets_verified() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);
        ship(root.path(), "alpha-20260101", b"alpha");
        ship(root.path(), "beta-20260101", b"beta");
        write_manifest(root.path(), &["alpha-20260101", "beta-20260101"]);

        let report = IngestVerifier::new(&config).run().unwrap().unwrap();

        assert_eq!(report.verified.len(), 2);
        let history = ArchiveHistory::load(&config.history_path()).unwrap();
        assert_eq!(history.archives("alpha"), &[stored(root.path(), "alpha-20260101")]);
        assert_eq!(history.archives("beta"), &[stored(root.path(), "beta-20260101")]);
        assert!(!config.manifest_path().exists());
    }

    #[test]
    fn mismatch_deletes_archive_and_sidecar() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);
        ship(root.path(), "alpha-1", b"alpha");
        std::fs::write(root.path().join("alpha-1.tar.zst"), b"corrupted in transit").unwrap();
        write_manifest(root.path(), &["alpha-1"]);

        let report = IngestVerifier::new(&config).run().unwrap().unwrap();

        assert_eq!(report.rejected, vec!["alpha-1.tar.zst".to_string()]);
        assert!(!root.path().join("alpha-1.tar.zst").exists());
        assert!(!root.path().join("alpha-1.sha512").exists());
        let history = ArchiveHistory::load(&config.history_path()).unwrap();
        assert!(history.archives("alpha").is_empty());
    }

    #[test]
    fn missing_sidecar_deletes_archive() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);
        std::fs::write(root.path().join("alpha-1.tar.zst"), b"alpha").unwrap();
        write_manifest(root.path(), &["alpha-1"]);

        let report = IngestVerifier::new(&config).run().unwrap().unwrap();

        assert_eq!(report.rejected.len(), 1);
        assert!(!root.path().join("alpha-1.tar.zst").exists());
    }

    #[test]
    fn unusable_entries_are_skipped() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);
        ship(root.path(), "nodash", b"x");
        write_manifest(root.path(), &["nodash", "gone-1", "../etc-1"]);

        let report = IngestVerifier::new(&config).run().unwrap().unwrap();

        assert_eq!(report.skipped.len(), 3);
        assert!(report.verified.is_empty());
        assert!(root.path().join("nodash.tar.zst").exists());
        assert!(!config.manifest_path().exists());
    }

    #[test]
    fn empty_manifest_is_deleted() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);
        std::fs::write(config.manifest_path(), "\n\n").unwrap();

        let report = IngestVerifier::new(&config).run().unwrap().unwrap();

        assert!(report.verified.is_empty());
        assert!(!config.manifest_path().exists());
    }

    #[test]
    fn three_ingests_at_depth_two() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);

        for run in 1..=3 {
            let name = format!("alpha-{}", run);
            ship(root.path(), &name, name.as_bytes());
            write_manifest(root.path(), &[name.as_str()]);
            IngestVerifier::new(&config).run().unwrap().unwrap();
        }

        let history = ArchiveHistory::load(&config.history_path()).unwrap();
        assert_eq!(
            history.archives("alpha"),
            &[stored(root.path(), "alpha-2"), stored(root.path(), "alpha-3")]
        );
        assert!(!root.path().join("alpha-1.tar.zst").exists());
        assert!(!root.path().join("alpha-1.sha512").exists());
        assert!(root.path().join("alpha-2.sha512").exists());
    }

    #[test]
    fn reingest_after_crash_is_idempotent() {
        let root = TempDir::new().unwrap();
        let config = test_config(root.path(), 2);
        ship(root.path(), "alpha-1", b"alpha");

        write_manifest(root.path(), &["alpha-1"]);
        IngestVerifier::new(&config).run().unwrap();
        write_manifest(root.path(), &["alpha-1"]);
        IngestVerifier::new(&config).run().unwrap();

        let history = ArchiveHistory::load(&config.history_path()).unwrap();
        assert_eq!(history.archives("alpha").len(), 1);
    }

    #[tokio::test]
    async fn ingest_pending_runs_under_lock() {
        let root = TempDir::new().unwrap();
        let state = Arc::new(AppState::new(test_config(root.path(), 2)));
        ship(root.path(), "alpha-1", b"alpha");
        write_manifest(root.path(), &["alpha-1"]);

        let report = ingest_pending(state.clone()).await.unwrap().unwrap();
        assert_eq!(report.verified.len(), 1);
        assert!(ingest_pending(state).await.unwrap().is_none());
    }
}
