//! Recording doubles for the provider and filesystem collaborators

use crate::disk::DiskConfig;
use crate::driver::{VolumeDriver, VolumeDriverConfig};
use crate::error::{FsError, ProviderError};
use crate::fs::{Filesystem, PathStat};
use crate::provider::{DiskProvider, DiskStatus, DiskSummary};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One collaborator call, in the order it was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(DiskConfig),
    List,
    Attach(String),
    Detach(String),
    Delete(String),
    Stat(PathBuf),
    MkdirAll(PathBuf, u32),
    Format(PathBuf),
    Mount(PathBuf, PathBuf),
    Unmount(PathBuf),
}

/// Call log shared by both doubles
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }
}

/// Injected failures keyed by operation name ("attach", "stat", ...)
#[derive(Debug, Default)]
struct Failures(Mutex<HashMap<&'static str, String>>);

impl Failures {
    fn get(&self, op: &'static str) -> Option<String> {
        self.0.lock().get(op).cloned()
    }
}

pub struct FakeProvider {
    log: CallLog,
    disks: Mutex<Vec<DiskSummary>>,
    failures: Failures,
}

impl FakeProvider {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            disks: Mutex::new(Vec::new()),
            failures: Failures::default(),
        }
    }

    pub fn add_disk(&self, name: &str, status: DiskStatus) {
        self.disks.lock().push(DiskSummary::new(name, status));
    }

    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures.0.lock().insert(op, message.to_string());
    }

    fn check(&self, op: &'static str) -> Result<(), ProviderError> {
        self.failures.get(op).map_or(Ok(()), |m| Err(ProviderError::Remote(m)))
    }
}

#[async_trait]
impl DiskProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        self.log.push(Call::Create(config.clone()));
        self.check("create")?;
        self.add_disk(&config.name, DiskStatus::Ready);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DiskSummary>, ProviderError> {
        self.log.push(Call::List);
        self.check("list")?;
        Ok(self.disks.lock().clone())
    }

    async fn attach(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        self.log.push(Call::Attach(config.name.clone()));
        self.check("attach")
    }

    async fn detach(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        self.log.push(Call::Detach(config.name.clone()));
        self.check("detach")
    }

    async fn delete(&self, config: &DiskConfig) -> Result<(), ProviderError> {
        self.log.push(Call::Delete(config.name.clone()));
        self.check("delete")?;
        self.disks.lock().retain(|d| d.name != config.name);
        Ok(())
    }
}

pub struct FakeFilesystem {
    log: CallLog,
    dirs: Mutex<HashSet<PathBuf>>,
    files: Mutex<HashSet<PathBuf>>,
    failures: Failures,
}

impl FakeFilesystem {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            dirs: Mutex::new(HashSet::new()),
            files: Mutex::new(HashSet::new()),
            failures: Failures::default(),
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>) {
        self.files.lock().insert(path.into());
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.lock().len()
    }

    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures.0.lock().insert(op, message.to_string());
    }

    fn check(&self, op: &'static str, path: &Path) -> Result<(), FsError> {
        self.failures.get(op).map_or(Ok(()), |m| {
            Err(FsError::io(
                op,
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, m),
            ))
        })
    }
}

#[async_trait]
impl Filesystem for FakeFilesystem {
    async fn stat(&self, path: &Path) -> Result<PathStat, FsError> {
        self.log.push(Call::Stat(path.to_path_buf()));
        self.check("stat", path)?;
        if self.dirs.lock().contains(path) {
            Ok(PathStat { is_dir: true })
        } else if self.files.lock().contains(path) {
            Ok(PathStat { is_dir: false })
        } else {
            Err(FsError::NotFound(path.to_path_buf()))
        }
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<(), FsError> {
        self.log.push(Call::MkdirAll(path.to_path_buf(), mode));
        self.check("mkdir", path)?;
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn format(&self, device: &Path) -> Result<(), FsError> {
        self.log.push(Call::Format(device.to_path_buf()));
        self.check("format", device)
    }

    async fn mount(&self, device: &Path, target: &Path) -> Result<(), FsError> {
        self.log
            .push(Call::Mount(device.to_path_buf(), target.to_path_buf()));
        self.check("mount", target)
    }

    async fn unmount(&self, target: &Path) -> Result<(), FsError> {
        self.log.push(Call::Unmount(target.to_path_buf()));
        self.check("unmount", target)
    }
}

/// A driver wired to recording doubles rooted at `/mnt/`
pub struct Harness {
    pub log: CallLog,
    pub provider: Arc<FakeProvider>,
    pub fs: Arc<FakeFilesystem>,
    pub driver: VolumeDriver,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        let provider = Arc::new(FakeProvider::new(log.clone()));
        let fs = Arc::new(FakeFilesystem::new(log.clone()));
        let driver = VolumeDriver::new(
            VolumeDriverConfig::default(),
            Arc::clone(&provider) as Arc<dyn DiskProvider>,
            Arc::clone(&fs) as Arc<dyn Filesystem>,
        );
        Self {
            log,
            provider,
            fs,
            driver,
        }
    }
}
