//! End-to-end client runs against fake capability adapters.

use backup_client::archive::archiver::Archiver;
use backup_client::archive::digest::{Digester, Sha512Digester};
use backup_client::transfer::host::{HostProbe, WakeSignal};
use backup_client::transfer::manifest::read_manifest;
use backup_client::transfer::trigger::IngestTrigger;
use backup_client::transfer::volume::Volume;
use backup_client::transfer::{Capabilities, TransferCoordinator, TransferSettings};
use backup_client::{AgentError, BackupRun, Config};
use futures_util::future::BoxFuture;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct Counters {
    probes: AtomicUsize,
    mounts: AtomicUsize,
    unmounts: AtomicUsize,
    triggers: AtomicUsize,
}

struct FakeProbe {
    reachable: bool,
    counters: Arc<Counters>,
}

impl HostProbe for FakeProbe {
    fn probe(&self) -> BoxFuture<'_, bool> {
        self.counters.probes.fetch_add(1, Ordering::SeqCst);
        let reachable = self.reachable;
        Box::pin(async move { reachable })
    }
}

struct FakeWake;

impl WakeSignal for FakeWake {
    fn wake(&self) -> BoxFuture<'_, backup_client::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

struct FakeVolume {
    fail_mount: bool,
    counters: Arc<Counters>,
}

impl Volume for FakeVolume {
    fn mount(&self) -> BoxFuture<'_, backup_client::Result<()>> {
        self.counters.mounts.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_mount;
        Box::pin(async move {
            if fail {
                Err(AgentError::Mount("mount: /mnt/backup: special device not found".into()))
            } else {
                Ok(())
            }
        })
    }

    fn unmount(&self) -> BoxFuture<'_, backup_client::Result<()>> {
        self.counters.unmounts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

struct FakeTrigger(Arc<Counters>);

impl IngestTrigger for FakeTrigger {
    fn notify(&self) -> BoxFuture<'_, backup_client::Result<()>> {
        self.0.triggers.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

/// Copies the directory listing into the "archive"; refuses directories named `broken`
struct ListingArchiver;

impl Archiver for ListingArchiver {
    fn package_extension(&self) -> &str {
        "tar"
    }

    fn artifact_extension(&self) -> &str {
        "tar.zst"
    }

    fn pack(&self, source: &Path, package: &Path) -> backup_client::Result<()> {
        if source.ends_with("broken") {
            return Err(AgentError::Archive("tar exited with 2".into()));
        }
        let names: Vec<String> = fs::read_dir(source)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        fs::write(package, names.join("\n"))?;
        Ok(())
    }

    fn compress(&self, package: &Path, artifact: &Path) -> backup_client::Result<()> {
        fs::copy(package, artifact)?;
        Ok(())
    }
}

struct Env {
    root: TempDir,
    counters: Arc<Counters>,
}

impl Env {
    fn new(targets: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        for dir in ["data", "metadata", "work", "dest"] {
            fs::create_dir(root.path().join(dir)).unwrap();
        }
        for target in targets {
            let dir = root.path().join("data").join(target);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("file.txt"), target.as_bytes()).unwrap();
        }
        let env = Self {
            root,
            counters: Arc::new(Counters::default()),
        };
        env.set_targets(targets);
        env
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn set_targets(&self, targets: &[&str]) {
        let list: Vec<String> = targets
            .iter()
            .map(|t| self.path("data").join(t).display().to_string())
            .collect();
        fs::write(self.path("targets.lst"), format!("{}\n\n", list.join("\n"))).unwrap();
    }

    fn config(&self) -> Config {
        let toml = format!(
            r#"
            [targets]
            list_file = "{targets}"

            [metadata]
            path = "{metadata}"

            [server]
            url = "http://127.0.0.1:1"
            mac = "00:1A:2B:3C:4D:5E"
            wake_backoff_secs = 0

            [destination]
            path = "{dest}"

            [archive]
            work_dir = "{work}"
            "#,
            targets = self.path("targets.lst").display(),
            metadata = self.path("metadata").display(),
            dest = self.path("dest").display(),
            work = self.path("work").display(),
        );
        Config::from_toml(&toml).unwrap()
    }

    fn run(&self, reachable: bool, fail_mount: bool) -> BackupRun {
        let config = self.config();
        let transfer = TransferCoordinator::new(
            Capabilities {
                probe: Box::new(FakeProbe {
                    reachable,
                    counters: self.counters.clone(),
                }),
                wake: Box::new(FakeWake),
                volume: Box::new(FakeVolume {
                    fail_mount,
                    counters: self.counters.clone(),
                }),
                trigger: Box::new(FakeTrigger(self.counters.clone())),
            },
            TransferSettings {
                wake_backoff: Duration::ZERO,
                ..TransferSettings::from_config(&config)
            },
        );
        BackupRun::new(config, Arc::new(ListingArchiver), Arc::new(Sha512Digester), transfer)
    }
}

#[tokio::test]
async fn first_run_ships_every_target() {
    let env = Env::new(&["alpha", "beta"]);

    let report = env.run(true, false).execute().await.unwrap();

    assert_eq!(report.new_targets, 2);
    assert_eq!(report.shipped.len(), 2);
    assert!(report.shipped[0].starts_with("alpha-"));
    assert!(report.shipped[1].starts_with("beta-"));

    let manifest = report.manifest.clone().unwrap();
    assert_eq!(read_manifest(&manifest).unwrap(), report.shipped);

    for name in &report.shipped {
        let archive = env.path("dest").join(name);
        let sidecar = env.path("dest").join(name.replace(".tar.zst", ".sha512"));
        let stored = fs::read_to_string(&sidecar).unwrap();
        let expected = Sha512Digester.digest_file(&archive).unwrap();
        assert_eq!(stored.split_whitespace().next(), Some(expected.as_str()));
    }

    assert_eq!(fs::read_dir(env.path("work")).unwrap().count(), 0);
    assert!(env.path("metadata/alpha.json").exists());
    assert!(env.path("metadata/beta.json").exists());

    assert_eq!(env.counters.mounts.load(Ordering::SeqCst), 1);
    assert_eq!(env.counters.unmounts.load(Ordering::SeqCst), 1);
    assert_eq!(env.counters.triggers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unchanged_targets_are_not_shipped_again() {
    let env = Env::new(&["alpha", "beta"]);
    env.run(true, false).execute().await.unwrap();
    fs::remove_file(env.path("dest/backup.lst")).unwrap();

    let report = env.run(true, false).execute().await.unwrap();

    assert_eq!(report.unchanged_targets, 2);
    assert!(report.shipped.is_empty());
    assert_eq!(report.manifest, None);
    assert!(!env.path("dest/backup.lst").exists());
    assert_eq!(env.counters.triggers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn changed_target_is_shipped() {
    let env = Env::new(&["alpha", "beta"]);
    env.run(true, false).execute().await.unwrap();

    fs::write(env.path("data/beta/extra.txt"), b"more").unwrap();
    let report = env.run(true, false).execute().await.unwrap();

    assert_eq!(report.unchanged_targets, 1);
    assert_eq!(report.changed_targets, 1);
    assert_eq!(report.shipped.len(), 1);
    assert!(report.shipped[0].starts_with("beta-"));
}

#[tokio::test]
async fn dropped_target_loses_its_descriptor() {
    let env = Env::new(&["alpha", "beta"]);
    env.run(true, false).execute().await.unwrap();
    assert!(env.path("metadata/beta.json").exists());

    env.set_targets(&["alpha"]);
    env.run(true, false).execute().await.unwrap();

    assert!(!env.path("metadata/beta.json").exists());
    let store: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(env.path("metadata/metadata.json")).unwrap())
            .unwrap();
    let keys: Vec<_> = store.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec![env.path("data/alpha").display().to_string()]);
}

#[tokio::test]
async fn archive_failure_skips_only_that_target() {
    let env = Env::new(&["broken", "gamma"]);

    let report = env.run(true, false).execute().await.unwrap();

    assert_eq!(report.new_targets, 2);
    assert_eq!(report.failed_targets, 1);
    assert_eq!(report.shipped.len(), 1);
    assert!(report.shipped[0].starts_with("gamma-"));

    // The decision was persisted before archiving, so the next run sees no change.
    let second = env.run(true, false).execute().await.unwrap();
    assert_eq!(second.unchanged_targets, 2);
}

#[tokio::test]
async fn missing_target_directory_is_skipped() {
    let env = Env::new(&["alpha"]);
    let list = format!(
        "{}\n{}\n",
        env.path("data/alpha").display(),
        env.path("data/vanished").display()
    );
    fs::write(env.path("targets.lst"), list).unwrap();

    let report = env.run(true, false).execute().await.unwrap();

    assert_eq!(report.failed_targets, 1);
    assert_eq!(report.shipped.len(), 1);
}

#[tokio::test]
async fn unconsumed_manifest_keeps_earlier_archives() {
    let env = Env::new(&["alpha", "beta"]);
    let first = env.run(true, false).execute().await.unwrap();

    fs::write(env.path("data/beta/extra.txt"), b"more").unwrap();
    let second = env.run(true, false).execute().await.unwrap();

    let listed = read_manifest(&env.path("dest/backup.lst")).unwrap();
    for name in first.shipped.iter().chain(&second.shipped) {
        assert!(listed.contains(name), "{} not listed", name);
        assert!(env.path("dest").join(name).exists());
    }
    assert_eq!(env.counters.triggers.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn store_save_failure_still_lists_and_announces() {
    let env = Env::new(&["alpha"]);
    fs::write(env.path("metadata/metadata.json"), "{}").unwrap();
    fs::create_dir(env.path("metadata/metadata.json.tmp")).unwrap();

    let err = env.run(true, false).execute().await.unwrap_err();

    assert!(matches!(err, AgentError::Io(_)));
    assert!(!err.is_fatal());

    let listed = read_manifest(&env.path("dest/backup.lst")).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].starts_with("alpha-"));
    assert!(env.path("dest").join(&listed[0]).exists());

    assert_eq!(env.counters.triggers.load(Ordering::SeqCst), 1);
    assert_eq!(env.counters.mounts.load(Ordering::SeqCst), 1);
    assert_eq!(env.counters.unmounts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_host_aborts_before_mount() {
    let env = Env::new(&["alpha"]);

    let err = env.run(false, false).execute().await.unwrap_err();

    assert!(matches!(err, AgentError::HostUnreachable(_)));
    assert_eq!(env.counters.probes.load(Ordering::SeqCst), 2);
    assert_eq!(env.counters.mounts.load(Ordering::SeqCst), 0);
    assert!(!env.path("metadata/alpha.json").exists());
}

#[tokio::test]
async fn mount_failure_is_fatal() {
    let env = Env::new(&["alpha"]);

    let err = env.run(true, true).execute().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(!env.path("metadata/metadata.json").exists());
    assert_eq!(env.counters.unmounts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_target_list_is_fatal() {
    let env = Env::new(&[]);

    let err = env.run(true, false).execute().await.unwrap_err();

    assert!(matches!(err, AgentError::Configuration(_)));
    assert_eq!(env.counters.probes.load(Ordering::SeqCst), 0);
}
