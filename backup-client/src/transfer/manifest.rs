//! Backup manifest: newline-delimited archive names waiting for ingest.

use crate::fs::atomic::atomic_write;
use std::path::Path;

/// Add `archive_names` to the manifest at `path` and return the full list.
///
/// A manifest the storage host has not consumed yet is extended rather than
/// replaced, so archives shipped by an earlier run stay listed. The write is
/// atomic; the storage host must never read a partial list.
pub fn write_manifest(path: &Path, archive_names: &[String]) -> std::io::Result<Vec<String>> {
    let mut names = match read_manifest(path) {
        Ok(pending) => pending,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };
    for name in archive_names {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    atomic_write(path, names.join("\n").as_bytes())?;
    Ok(names)
}

/// Archive names listed in a manifest, blank lines skipped
pub fn read_manifest(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
