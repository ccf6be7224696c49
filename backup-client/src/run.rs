//! One client run: detect, archive and ship every watched directory.
//!
//! Fatal errors (configuration, unreachable host, failed mount) end the run;
//! everything else is logged per target or per file and the batch goes on.

use crate::archive::archiver::{Archiver, TarZstdArchiver};
use crate::archive::digest::{Digester, Sha512Digester};
use crate::archive::{ArchiveArtifact, ArchivePipeline};
use crate::config::Config;
use crate::detector::{detect, Classification, Detection};
use crate::store::{MetadataStore, ResolvedTarget};
use crate::targets::load_target_list;
use crate::transfer::{Capabilities, TransferCoordinator, TransferSettings};
use crate::utils::errors::{AgentError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Summary of a finished run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub new_targets: usize,
    pub changed_targets: usize,
    pub unchanged_targets: usize,
    pub failed_targets: usize,

    /// Archive names moved to the destination, in processing order
    pub shipped: Vec<String>,

    pub manifest: Option<PathBuf>,
}

/// Result of the blocking part of a target: detection plus optional archive
struct TargetOutcome {
    detection: Detection,
    archive: Option<Result<ArchiveArtifact>>,
}

pub struct BackupRun {
    config: Config,
    archiver: Arc<dyn Archiver>,
    digester: Arc<dyn Digester>,
    transfer: TransferCoordinator,
}

impl BackupRun {
    /// Run with the default adapters built from `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let capabilities = Capabilities::from_config(&config)?;
        let transfer = TransferCoordinator::new(capabilities, TransferSettings::from_config(&config));
        let archiver = Arc::new(TarZstdArchiver::new(config.archive.compression_level));
        Ok(Self::new(config, archiver, Arc::new(Sha512Digester), transfer))
    }

    pub fn new(
        config: Config,
        archiver: Arc<dyn Archiver>,
        digester: Arc<dyn Digester>,
        transfer: TransferCoordinator,
    ) -> Self {
        Self {
            config,
            archiver,
            digester,
            transfer,
        }
    }

    pub async fn execute(&self) -> Result<RunReport> {
        info!("Backup started");

        let targets = load_target_list(&self.config.targets.list_file)?;
        info!(targets = targets.len(), "Target list loaded");

        self.transfer.ensure_host_available().await?;
        self.transfer.mount().await?;

        // Unmount regardless of how the batch went.
        let outcome = self.process_targets(&targets).await;
        self.transfer.unmount().await;

        match &outcome {
            Ok(report) => info!(
                new = report.new_targets,
                changed = report.changed_targets,
                unchanged = report.unchanged_targets,
                failed = report.failed_targets,
                shipped = report.shipped.len(),
                "Backup finished"
            ),
            Err(e) => error!("Backup aborted: {}", e),
        }

        outcome
    }

    async fn process_targets(&self, targets: &[PathBuf]) -> Result<RunReport> {
        let mut store = MetadataStore::load(
            &self.config.metadata.path,
            &self.config.metadata.dict_file_name,
        )?;
        if store.is_empty() {
            info!("Metadata store empty, every target is new");
        } else {
            info!(known = store.len(), "Metadata store loaded");
        }
        let resolved = store.resolve(targets);

        let mut report = RunReport::default();

        for target in resolved {
            info!(target = %target.path.display(), "Processing directory");

            let outcome = match self.backup_target(&target).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(target = %target.path.display(), "Skipping target: {}", e);
                    report.failed_targets += 1;
                    continue;
                }
            };

            store.assign(&target.path, &outcome.detection.descriptor);
            match outcome.detection.classification {
                Classification::New => report.new_targets += 1,
                Classification::Changed => report.changed_targets += 1,
                Classification::Unchanged => report.unchanged_targets += 1,
            }

            match outcome.archive {
                None => {}
                Some(Err(e)) => {
                    error!(target = %target.path.display(), "Can not create archive: {}", e);
                    report.failed_targets += 1;
                }
                Some(Ok(artifact)) => match self.transfer.ship(&artifact).await {
                    Ok(name) => report.shipped.push(name),
                    Err(e) => {
                        error!(archive = %artifact.archive.display(), "Copy failed: {}", e);
                        report.failed_targets += 1;
                    }
                },
            }
        }

        // Archives already on the destination must be listed and announced
        // even when the store cannot be saved.
        let saved = store.save();
        if let Err(e) = &saved {
            error!("Metadata store not saved: {}", e);
        }

        report.manifest = self.transfer.write_manifest(&report.shipped)?;
        if report.manifest.is_some() {
            self.transfer.notify_ingest().await;
        }

        saved?;
        Ok(report)
    }

    /// Snapshot, classify and (if needed) archive one target off the async runtime.
    async fn backup_target(&self, target: &ResolvedTarget) -> Result<TargetOutcome> {
        let path = target.path.clone();
        let stored = target.descriptor.clone();
        let metadata_dir = self.config.metadata.path.clone();
        let work_dir = self.config.work_dir().to_path_buf();
        let timestamp_format = self.config.destination.file_name_timestamp_format.clone();
        let archiver = Arc::clone(&self.archiver);
        let digester = Arc::clone(&self.digester);

        tokio::task::spawn_blocking(move || {
            let detection = detect(&path, stored.as_deref(), &metadata_dir)?;

            let archive = detection.classification.needs_backup().then(|| {
                let timestamp = chrono::Local::now().format(&timestamp_format).to_string();
                ArchivePipeline::new(archiver.as_ref(), digester.as_ref(), &work_dir)
                    .run(&path, &timestamp)
            });

            Ok(TargetOutcome { detection, archive })
        })
        .await
        .map_err(|e| AgentError::Archive(format!("target task failed: {}", e)))?
    }
}
