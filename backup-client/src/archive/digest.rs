//! Digest capability: checksum of a finished artifact.

use crate::utils::errors::Result;
use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub trait Digester: Send + Sync {
    /// Extension of the checksum sidecar, without leading dot
    fn sidecar_extension(&self) -> &str;

    /// Hex checksum of the file at `path`
    fn digest_file(&self, path: &Path) -> Result<String>;
}

/// Streaming SHA-512, written in `sha512sum` layout
#[derive(Debug, Clone, Default)]
pub struct Sha512Digester;

impl Digester for Sha512Digester {
    fn sidecar_extension(&self) -> &str {
        "sha512"
    }

    fn digest_file(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha512::new();
        let mut buffer = vec![0u8; 64 * 1024];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

/// Sidecar content: `<hex>  <file name>` followed by a newline
pub fn sidecar_line(digest: &str, artifact_name: &str) -> String {
    format!("{}  {}\n", digest, artifact_name)
}
