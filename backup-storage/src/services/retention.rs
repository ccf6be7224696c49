use crate::error::StorageError;
use crate::models::archive_history::ArchiveHistory;
use crate::services::digest::sidecar_path;
use std::path::Path;

/// Keeps at most `depth` archives per target, evicting the oldest first.
pub struct RetentionEngine<'a> {
    depth: usize,
    archive_extension: &'a str,
    sidecar_extension: &'a str,
}

impl<'a> RetentionEngine<'a> {
    pub fn new(depth: usize, archive_extension: &'a str, sidecar_extension: &'a str) -> Self {
        Self {
            depth,
            archive_extension,
            sidecar_extension,
        }
    }

    /// Append `archive` to the target's history and prune it back to depth.
    /// Returns the evicted archive paths.
    pub fn record(&self, history: &mut ArchiveHistory, target: &str, archive: &str) -> Vec<String> {
        let archives = history.entry(target);
        if archives.iter().any(|a| a == archive) {
            tracing::info!(identity = target, archive, "Archive already recorded");
            return Vec::new();
        }
        archives.push(archive.to_string());

        let mut evicted = Vec::new();
        while archives.len() > self.depth {
            let oldest = archives.remove(0);
            match self.evict(Path::new(&oldest)) {
                Ok(()) => tracing::info!(identity = target, archive = %oldest, "Old archive removed"),
                Err(e) => tracing::error!(identity = target, archive = %oldest, "{}", e),
            }
            evicted.push(oldest);
        }
        evicted
    }

    /// Delete an archive and its sidecar, attempting both even if one fails.
    fn evict(&self, archive: &Path) -> Result<(), StorageError> {
        let sidecar = sidecar_path(archive, self.archive_extension, self.sidecar_extension);
        let failures: Vec<String> = [archive, sidecar.as_path()]
            .into_iter()
            .filter_map(|path| {
                std::fs::remove_file(path)
                    .err()
                    .map(|e| format!("{}: {}", path.display(), e))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StorageError::Eviction(failures.join("; ")))
        }
    }
}
