//! Volume capability: mount and release the destination filesystem.

use crate::utils::errors::{AgentError, Result};
use futures_util::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

pub trait Volume: Send + Sync {
    fn mount(&self) -> BoxFuture<'_, Result<()>>;

    fn unmount(&self) -> BoxFuture<'_, Result<()>>;
}

/// Runs `mount <point>` / `umount <point>`, relying on an fstab entry
pub struct CommandVolume {
    mount_point: PathBuf,
    timeout: Duration,
}

impl CommandVolume {
    pub fn new(mount_point: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            mount_point: mount_point.into(),
            timeout,
        }
    }
}

impl Volume for CommandVolume {
    fn mount(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(run_mount_command("mount", &self.mount_point, self.timeout))
    }

    fn unmount(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(run_mount_command("umount", &self.mount_point, self.timeout))
    }
}

/// Destination that is always available (local disk, permanent mount)
#[derive(Debug, Default)]
pub struct StaticVolume;

impl Volume for StaticVolume {
    fn mount(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn unmount(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

async fn run_mount_command(program: &str, mount_point: &Path, timeout: Duration) -> Result<()> {
    let output = tokio::time::timeout(
        timeout,
        Command::new(program).arg(mount_point).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| {
        AgentError::Mount(format!(
            "{} {} timed out after {}s",
            program,
            mount_point.display(),
            timeout.as_secs()
        ))
    })?
    .map_err(|e| AgentError::Mount(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(AgentError::Mount(format!(
            "{} {} exited with {}: {}",
            program,
            mount_point.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_volume_always_mounts() {
        let volume = StaticVolume;
        assert!(volume.mount().await.is_ok());
        assert!(volume.unmount().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_mount_point_fails() {
        let volume = CommandVolume::new("/nonexistent/backup-mount-point", Duration::from_secs(5));
        let err = volume.mount().await.unwrap_err();
        assert!(matches!(err, AgentError::Mount(_)));
    }
}
