use crate::error::StorageError;
use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const BUF_SIZE: usize = 64 * 1024;

/// Hex SHA-512 of a file, streamed
pub fn sha512_file(path: &Path) -> Result<String, StorageError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// First whitespace-separated token of a sidecar file.
///
/// A missing or empty sidecar is a verification failure; other read errors are I/O.
pub fn read_sidecar_digest(path: &Path) -> Result<String, StorageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::Verification(format!(
                "checksum file {} missing",
                path.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };
    content
        .split_whitespace()
        .next()
        .map(|token| token.to_ascii_lowercase())
        .ok_or_else(|| StorageError::Verification(format!("checksum file {} is empty", path.display())))
}

/// `photos-1.tar.zst` → `photos-1.sha512` for the configured extensions
pub fn sidecar_path(archive: &Path, archive_extension: &str, sidecar_extension: &str) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = format!(".{}", archive_extension);
    match name.strip_suffix(&suffix) {
        Some(base) => archive.with_file_name(format!("{}.{}", base, sidecar_extension)),
        None => archive.with_extension(sidecar_extension),
    }
}
