use crate::error::StorageError;
use crate::models::archive_history::HISTORY_FILE_NAME;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Directory receiving archives, sidecars and the manifest
    pub backup_root: PathBuf,
    pub manifest_file_name: String,
    /// Maximum number of archives kept per target
    pub retention_depth: usize,
    /// Manifest poll period; zero disables polling
    pub poll_interval: Duration,
    pub archive_extension: String,
    pub sidecar_extension: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StorageError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, StorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            port: parse_var(&lookup, "PORT", 3000)?,
            backup_root: PathBuf::from(
                lookup("BACKUP_ROOT").unwrap_or_else(|| "/backup/data/archives".into()),
            ),
            manifest_file_name: lookup("MANIFEST_FILE_NAME").unwrap_or_else(|| "backup.lst".into()),
            retention_depth: parse_var(&lookup, "RETENTION_DEPTH", 7)?,
            poll_interval: Duration::from_secs(parse_var(&lookup, "POLL_INTERVAL_SECS", 60)?),
            archive_extension: lookup("ARCHIVE_EXTENSION").unwrap_or_else(|| "tar.zst".into()),
            sidecar_extension: lookup("SIDECAR_EXTENSION").unwrap_or_else(|| "sha512".into()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.retention_depth == 0 {
            return Err(StorageError::Configuration("RETENTION_DEPTH must be at least 1".into()));
        }
        for (key, value) in [
            ("MANIFEST_FILE_NAME", &self.manifest_file_name),
            ("ARCHIVE_EXTENSION", &self.archive_extension),
            ("SIDECAR_EXTENSION", &self.sidecar_extension),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::Configuration(format!("{} is empty", key)));
            }
        }
        if self.archive_extension == self.sidecar_extension {
            return Err(StorageError::Configuration(
                "ARCHIVE_EXTENSION and SIDECAR_EXTENSION must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.backup_root.join(&self.manifest_file_name)
    }

    pub fn history_path(&self) -> PathBuf {
        self.backup_root.join(HISTORY_FILE_NAME)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, StorageError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| StorageError::Configuration(format!("{}={:?}: {}", key, raw, e))),
    }
}

#[cfg(test)]
pub(crate) fn test_config(backup_root: &std::path::Path, retention_depth: usize) -> AppConfig {
    AppConfig {
        port: 0,
        backup_root: backup_root.to_path_buf(),
        manifest_file_name: "backup.lst".into(),
        retention_depth,
        poll_interval: Duration::ZERO,
        archive_extension: "tar.zst".into(),
        sidecar_extension: "sha512".into(),
        log_level: "info".into(),
    }
}
