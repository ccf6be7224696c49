//! Transfer coordination between the client and the storage host.
//!
//! Wakes and probes the host, brackets the batch with one mount/unmount,
//! moves artifacts onto the destination volume, writes the manifest and
//! notifies the host that new archives are waiting.

pub mod host;
pub mod manifest;
pub mod trigger;
pub mod volume;

use crate::archive::ArchiveArtifact;
use crate::config::Config;
use crate::utils::errors::{AgentError, Result};
use host::{HostProbe, HttpHealthProbe, WakeOnLan, WakeSignal};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use trigger::{HttpIngestTrigger, IngestTrigger};
use volume::{CommandVolume, StaticVolume, Volume};

/// Pluggable adapters the coordinator drives
pub struct Capabilities {
    pub probe: Box<dyn HostProbe>,
    pub wake: Box<dyn WakeSignal>,
    pub volume: Box<dyn Volume>,
    pub trigger: Box<dyn IngestTrigger>,
}

impl Capabilities {
    /// HTTP probe, Wake-on-LAN, `mount` command (if configured) and HTTP trigger
    pub fn from_config(config: &Config) -> Result<Self> {
        let volume: Box<dyn Volume> = match &config.destination.mount_point {
            Some(point) => Box::new(CommandVolume::new(point, config.mount_timeout())),
            None => Box::new(StaticVolume),
        };

        Ok(Self {
            probe: Box::new(HttpHealthProbe::new(&config.server.url, config.probe_timeout())?),
            wake: Box::new(WakeOnLan::new(&config.server.mac, &config.server.broadcast_addr)?),
            volume,
            trigger: Box::new(HttpIngestTrigger::new(&config.server.url, config.trigger_timeout())?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Wait between the wake signal and the second probe
    pub wake_backoff: Duration,

    /// Directory on the mounted volume receiving archives
    pub destination: PathBuf,

    pub manifest_file_name: String,
}

impl TransferSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wake_backoff: config.wake_backoff(),
            destination: config.destination.path.clone(),
            manifest_file_name: config.destination.manifest_file_name.clone(),
        }
    }
}

pub struct TransferCoordinator {
    capabilities: Capabilities,
    settings: TransferSettings,
}

impl TransferCoordinator {
    pub fn new(capabilities: Capabilities, settings: TransferSettings) -> Self {
        Self {
            capabilities,
            settings,
        }
    }

    /// Probe the storage host, waking it and probing once more if needed.
    pub async fn ensure_host_available(&self) -> Result<()> {
        if self.capabilities.probe.probe().await {
            info!("Storage host reachable");
            return Ok(());
        }

        info!("Storage host unreachable, sending wake signal");
        if let Err(e) = self.capabilities.wake.wake().await {
            warn!("Wake signal failed: {}", e);
        }

        tokio::time::sleep(self.settings.wake_backoff).await;

        if self.capabilities.probe.probe().await {
            info!("Storage host woke up");
            Ok(())
        } else {
            Err(AgentError::HostUnreachable(format!(
                "no answer after wake signal and {}s backoff",
                self.settings.wake_backoff.as_secs()
            )))
        }
    }

    pub async fn mount(&self) -> Result<()> {
        self.capabilities.volume.mount().await?;
        info!(destination = %self.settings.destination.display(), "Destination volume mounted");
        Ok(())
    }

    /// Release the volume. Failures are logged, never escalated.
    pub async fn unmount(&self) {
        match self.capabilities.volume.unmount().await {
            Ok(()) => info!("Destination volume unmounted"),
            Err(e) => error!("Server folder unmount failed: {}", e),
        }
    }

    /// Move sidecar, then archive, to the destination. Returns the archive's
    /// file name as listed in the manifest.
    pub async fn ship(&self, artifact: &ArchiveArtifact) -> Result<String> {
        if let Err(e) = move_file(&artifact.sidecar, &self.settings.destination).await {
            discard_local(&artifact.archive).await;
            discard_local(&artifact.sidecar).await;
            return Err(e);
        }

        if let Err(e) = move_file(&artifact.archive, &self.settings.destination).await {
            discard_local(&artifact.archive).await;
            return Err(e);
        }

        let name = artifact.archive_name();
        info!(archive = %name, "Archive and checksum copied");
        Ok(name)
    }

    /// List this run's archives in the manifest, keeping entries of a manifest
    /// still waiting for ingest. Nothing is written for an empty run.
    pub fn write_manifest(&self, archive_names: &[String]) -> Result<Option<PathBuf>> {
        if archive_names.is_empty() {
            info!("No changed directories found, manifest not written");
            return Ok(None);
        }

        let path = self.settings.destination.join(&self.settings.manifest_file_name);
        let listed = manifest::write_manifest(&path, archive_names)?;
        if listed.len() > archive_names.len() {
            warn!(
                pending = listed.len() - archive_names.len(),
                "Previous manifest not ingested yet, extending it"
            );
        }
        info!(path = %path.display(), archives = listed.len(), "Manifest written");
        Ok(Some(path))
    }

    /// Fire-and-forget notification of the storage host.
    pub async fn notify_ingest(&self) {
        match self.capabilities.trigger.notify().await {
            Ok(()) => info!("Checksum verification task started on storage host"),
            Err(e) => error!("Checksum verification task on storage host failed: {}", e),
        }
    }
}

/// Rename into `dest_dir`, falling back to copy + remove across filesystems.
/// The source is removed only once the destination holds a full copy.
async fn move_file(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| AgentError::Copy(format!("{} has no file name", src.display())))?;
    let dest = dest_dir.join(name);

    if tokio::fs::rename(src, &dest).await.is_ok() {
        return Ok(dest);
    }

    if let Err(e) = tokio::fs::copy(src, &dest).await {
        let _ = tokio::fs::remove_file(&dest).await;
        return Err(AgentError::Copy(format!(
            "{} -> {}: {}",
            src.display(),
            dest.display(),
            e
        )));
    }

    if let Err(e) = tokio::fs::remove_file(src).await {
        warn!(path = %src.display(), "Copied but failed to remove local file: {}", e);
    }

    Ok(dest)
}

async fn discard_local(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove local file: {}", e);
        }
    }
}
