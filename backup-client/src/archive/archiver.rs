//! Archiver capability: pack a directory, then compress the package.

use crate::utils::errors::{AgentError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Produces a compressed artifact from a directory in two steps.
pub trait Archiver: Send + Sync {
    /// Extension of the uncompressed package, without leading dot
    fn package_extension(&self) -> &str;

    /// Extension of the compressed artifact, without leading dot
    fn artifact_extension(&self) -> &str;

    /// Pack `source` into the uncompressed `package` file.
    fn pack(&self, source: &Path, package: &Path) -> Result<()>;

    /// Compress `package` into `artifact`.
    fn compress(&self, package: &Path, artifact: &Path) -> Result<()>;
}

/// `tar` for packing, zstd for compression
#[derive(Debug, Clone)]
pub struct TarZstdArchiver {
    compression_level: i32,
}

impl TarZstdArchiver {
    pub fn new(compression_level: i32) -> Self {
        Self { compression_level }
    }
}

impl Archiver for TarZstdArchiver {
    fn package_extension(&self) -> &str {
        "tar"
    }

    fn artifact_extension(&self) -> &str {
        "tar.zst"
    }

    fn pack(&self, source: &Path, package: &Path) -> Result<()> {
        let (parent, name) = match (source.parent(), source.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => {
                return Err(AgentError::Archive(format!(
                    "cannot pack {}: no parent directory",
                    source.display()
                )))
            }
        };

        debug!(source = %source.display(), package = %package.display(), "Packing");

        let output = Command::new("tar")
            .arg("-cf")
            .arg(package)
            .arg("-C")
            .arg(parent)
            .arg(name)
            .output()
            .map_err(|e| AgentError::Archive(format!("failed to run tar: {}", e)))?;

        if !output.status.success() {
            return Err(AgentError::Archive(format!(
                "tar exited with {} for {}: {}",
                output.status,
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    fn compress(&self, package: &Path, artifact: &Path) -> Result<()> {
        debug!(package = %package.display(), artifact = %artifact.display(), "Compressing");

        let input = BufReader::new(File::open(package)?);
        let mut output = BufWriter::new(File::create(artifact)?);
        zstd::stream::copy_encode(input, &mut output, self.compression_level)
            .map_err(|e| AgentError::Archive(format!("zstd failed for {}: {}", package.display(), e)))?;
        output.flush()?;

        Ok(())
    }
}
