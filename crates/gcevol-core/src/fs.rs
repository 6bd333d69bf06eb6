//! Local filesystem abstraction

use crate::error::FsError;
use async_trait::async_trait;
use std::path::Path;

/// Permission bits for newly created mount points
pub const MOUNT_POINT_MODE: u32 = 0o755;

/// Result of a successful stat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStat {
    pub is_dir: bool,
}

/// Host filesystem operations the driver depends on
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Stat a path; a missing path yields [`FsError::NotFound`]
    async fn stat(&self, path: &Path) -> Result<PathStat, FsError>;

    /// Create a directory and all missing parents
    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<(), FsError>;

    /// Put a filesystem on the device, subject to the implementation's format policy
    async fn format(&self, device: &Path) -> Result<(), FsError>;

    /// Mount `device` on `target`
    async fn mount(&self, device: &Path, target: &Path) -> Result<(), FsError>;

    /// Unmount whatever is mounted on `target`
    async fn unmount(&self, target: &Path) -> Result<(), FsError>;
}
