//! Volume driver: sequences provider and filesystem lifecycles
//!
//! Each public operation takes a plugin [`Request`] and always returns a
//! well-formed [`Response`]. Steps run strictly in order and the first
//! failure aborts the rest; nothing already done is rolled back.

use crate::disk::{DEFAULT_DEVICE_PREFIX, DiskConfig};
use crate::error::{FsError, Result};
use crate::fs::{Filesystem, MOUNT_POINT_MODE};
use crate::protocol::{Capability, Payload, Request, Response, Scope, VolumeInfo, into_response};
use crate::provider::DiskProvider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Default directory under which volumes are mounted
pub const DEFAULT_ROOT: &str = "/mnt/";

/// Construction-time settings of the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDriverConfig {
    /// Mount root; each volume is mounted at `<root>/<name>`
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Prefix joined with the disk name to form its device path
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_device_prefix() -> String {
    DEFAULT_DEVICE_PREFIX.to_string()
}

impl Default for VolumeDriverConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            device_prefix: default_device_prefix(),
        }
    }
}

/// Stateless volume driver
pub struct VolumeDriver {
    config: VolumeDriverConfig,
    provider: Arc<dyn DiskProvider>,
    fs: Arc<dyn Filesystem>,
}

impl VolumeDriver {
    /// Create a new driver over the given collaborators
    pub fn new(
        config: VolumeDriverConfig,
        provider: Arc<dyn DiskProvider>,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        Self {
            config,
            provider,
            fs,
        }
    }

    /// Get the mount root
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Create the remote disk for a volume
    pub async fn create(&self, req: &Request) -> Response {
        debug!(name = %req.name, "create request received");
        let start = Instant::now();

        let result = self.try_create(req).await;
        if result.is_ok() {
            info!(disk = %req.name, elapsed = ?start.elapsed(), "disk created");
        }
        respond("create", result.map(|()| Payload::Empty))
    }

    /// List ready volumes
    pub async fn list(&self, _req: &Request) -> Response {
        debug!("list request received");
        respond("list", self.try_list().await.map(Payload::Volumes))
    }

    /// Look up one volume; an unknown name is not an error
    pub async fn get(&self, req: &Request) -> Response {
        debug!(name = %req.name, "get request received");
        respond("get", self.try_get(req).await.map(Payload::Volume))
    }

    /// Delete the remote disk for a volume
    pub async fn remove(&self, req: &Request) -> Response {
        debug!(name = %req.name, "remove request received");
        let start = Instant::now();

        let result = self.try_remove(req).await;
        if result.is_ok() {
            info!(disk = %req.name, elapsed = ?start.elapsed(), "disk removed");
        }
        respond("remove", result.map(|()| Payload::Empty))
    }

    /// Report the mount path, creating the mount-point directory if needed
    pub async fn path(&self, req: &Request) -> Response {
        debug!(name = %req.name, "path request received");
        let result = self.try_path(req).await;
        respond("path", result.map(|p| Payload::Mountpoint(display(&p))))
    }

    /// Attach, format and mount a volume
    pub async fn mount(&self, req: &Request) -> Response {
        debug!(name = %req.name, "mount request received");
        let start = Instant::now();

        let result = self.try_mount(req).await;
        if result.is_ok() {
            info!(disk = %req.name, elapsed = ?start.elapsed(), "disk mounted");
        }
        respond("mount", result.map(|p| Payload::Mountpoint(display(&p))))
    }

    /// Unmount and detach a volume
    pub async fn unmount(&self, req: &Request) -> Response {
        debug!(name = %req.name, "unmount request received");
        let start = Instant::now();

        let result = self.try_unmount(req).await;
        if result.is_ok() {
            info!(disk = %req.name, elapsed = ?start.elapsed(), "disk unmounted");
        }
        respond("unmount", result.map(|()| Payload::Empty))
    }

    /// Static capability descriptor
    pub fn capabilities(&self, _req: &Request) -> Response {
        debug!("capabilities request received");
        Payload::Capabilities(Capability {
            scope: Scope::Local,
        })
        .into()
    }

    fn derive(req: &Request) -> Result<DiskConfig> {
        Ok(DiskConfig::derive(&req.name, &req.options)?)
    }

    async fn try_create(&self, req: &Request) -> Result<()> {
        let config = Self::derive(req)?;
        self.provider.create(&config).await?;
        Ok(())
    }

    async fn try_list(&self) -> Result<Vec<VolumeInfo>> {
        let disks = self.provider.list().await?;
        Ok(disks
            .into_iter()
            .filter(|d| d.status.is_ready())
            .map(|d| VolumeInfo::new(d.name))
            .collect())
    }

    async fn try_get(&self, req: &Request) -> Result<Option<VolumeInfo>> {
        let disks = self.provider.list().await?;
        let Some(disk) = disks.into_iter().find(|d| d.name == req.name) else {
            return Ok(None);
        };

        let config = Self::derive(req)?;
        let mountpoint = config.mount_point(self.root());
        Ok(Some(VolumeInfo::new(disk.name).with_mountpoint(&mountpoint)))
    }

    async fn try_remove(&self, req: &Request) -> Result<()> {
        let config = Self::derive(req)?;
        self.provider.delete(&config).await?;
        Ok(())
    }

    async fn try_path(&self, req: &Request) -> Result<PathBuf> {
        let config = Self::derive(req)?;
        let target = config.mount_point(self.root());
        debug!(name = %req.name, mnt = %target.display(), "resolved mount point");

        self.ensure_mount_point(&target).await?;
        Ok(target)
    }

    async fn try_mount(&self, req: &Request) -> Result<PathBuf> {
        let config = Self::derive(req)?;
        let target = config.mount_point(self.root());
        let device = config.device_path(&self.config.device_prefix);

        // detached, no directory -> detached, directory
        self.ensure_mount_point(&target).await?;
        // -> attached; a later failure leaves the disk attached
        self.provider.attach(&config).await?;
        // -> attached, formatted
        self.fs.format(&device).await?;
        // -> mounted
        self.fs.mount(&device, &target).await?;

        Ok(target)
    }

    async fn try_unmount(&self, req: &Request) -> Result<()> {
        let config = Self::derive(req)?;
        let target = config.mount_point(self.root());

        // mounted -> attached; on failure the disk stays attached
        self.fs.unmount(&target).await?;
        // attached -> detached
        self.provider.detach(&config).await?;

        Ok(())
    }

    /// Make sure `target` exists as a directory
    async fn ensure_mount_point(&self, target: &Path) -> Result<()> {
        match self.fs.stat(target).await {
            Ok(stat) if stat.is_dir => Ok(()),
            Ok(_) => Err(FsError::NotADirectory(target.to_path_buf()).into()),
            Err(e) if e.is_not_found() => {
                self.fs.mkdir_all(target, MOUNT_POINT_MODE).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Log a failure and map the outcome to a response
fn respond(operation: &'static str, result: Result<Payload>) -> Response {
    if let Err(e) = &result {
        error!(operation, error = %e, "request failed");
    }
    into_response(result)
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
