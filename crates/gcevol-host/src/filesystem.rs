//! Linux host implementation of [`Filesystem`]

use crate::config::{FormatPolicy, HostConfig};
use crate::options::MountOptions;
use async_trait::async_trait;
use gcevol_core::{Filesystem, FsError, PathStat};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// blkid exit status when no signature matched
const BLKID_NOT_FOUND: i32 = 2;

/// Local filesystem of the host the plugin runs on
#[derive(Debug, Clone)]
pub struct HostFilesystem {
    config: HostConfig,
    options: MountOptions,
}

impl HostFilesystem {
    pub fn new(config: HostConfig) -> Self {
        let options = MountOptions::parse(&config.mount_options);
        Self { config, options }
    }

    /// Run a command to completion, capturing its output
    async fn run(program: &str, args: &[&str], device: &Path) -> Result<Output, FsError> {
        debug!(program, ?args, device = %device.display(), "running command");
        Command::new(program)
            .args(args)
            .arg(device)
            .output()
            .await
            .map_err(|e| FsError::io("exec", program, e))
    }

    /// Filesystem type already present on `device`, if any
    async fn probe(&self, device: &Path) -> Result<Option<String>, FsError> {
        let output = Self::run("blkid", &["-p", "-o", "value", "-s", "TYPE"], device).await?;
        if output.status.code() == Some(BLKID_NOT_FOUND) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(command_error("blkid", &output));
        }
        let fs_type = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!fs_type.is_empty()).then_some(fs_type))
    }

    async fn mkfs(&self, device: &Path) -> Result<(), FsError> {
        let program = format!("mkfs.{}", self.config.fs_type);
        info!(device = %device.display(), fs_type = %self.config.fs_type, "formatting device");

        let output = Self::run(&program, &[force_flag(&self.config.fs_type)], device).await?;
        if !output.status.success() {
            return Err(command_error(&program, &output));
        }

        info!(device = %device.display(), "formatted device");
        Ok(())
    }
}

/// Flag that stops mkfs from prompting about existing data
fn force_flag(fs_type: &str) -> &'static str {
    match fs_type {
        "xfs" | "btrfs" => "-f",
        _ => "-F",
    }
}

fn command_error(command: &str, output: &Output) -> FsError {
    FsError::Command {
        command: command.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[async_trait]
impl Filesystem for HostFilesystem {
    async fn stat(&self, path: &Path) -> Result<PathStat, FsError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| FsError::io("stat", path, e))?;
        Ok(PathStat {
            is_dir: metadata.is_dir(),
        })
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<(), FsError> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        builder
            .create(path)
            .await
            .map_err(|e| FsError::io("mkdir", path, e))
    }

    async fn format(&self, device: &Path) -> Result<(), FsError> {
        if self.config.format_policy == FormatPolicy::IfUnformatted {
            if let Some(existing) = self.probe(device).await? {
                if existing != self.config.fs_type {
                    warn!(
                        device = %device.display(),
                        %existing,
                        wanted = %self.config.fs_type,
                        "device holds a different filesystem, leaving it untouched"
                    );
                } else {
                    debug!(device = %device.display(), %existing, "device already formatted");
                }
                return Ok(());
            }
        }
        self.mkfs(device).await
    }

    async fn mount(&self, device: &Path, target: &Path) -> Result<(), FsError> {
        let device = device.to_path_buf();
        let target = target.to_path_buf();
        let fs_type = self.config.fs_type.clone();
        let options = self.options.clone();

        let joined = target.clone();
        tokio::task::spawn_blocking(move || sys::mount(&device, &target, &fs_type, &options))
            .await
            .map_err(|e| FsError::io("mount", joined, io::Error::other(e)))?
    }

    async fn unmount(&self, target: &Path) -> Result<(), FsError> {
        let target: PathBuf = target.to_path_buf();
        let joined = target.clone();
        tokio::task::spawn_blocking(move || sys::unmount(&target))
            .await
            .map_err(|e| FsError::io("umount", joined, io::Error::other(e)))?
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use crate::options::{MountFlag, MountOptions};
    use gcevol_core::FsError;
    use nix::mount::{MsFlags, mount as mount2, umount};
    use std::path::Path;
    use tracing::info;

    const fn ms_flag(flag: MountFlag) -> MsFlags {
        match flag {
            MountFlag::ReadOnly => MsFlags::MS_RDONLY,
            MountFlag::NoSuid => MsFlags::MS_NOSUID,
            MountFlag::NoDev => MsFlags::MS_NODEV,
            MountFlag::NoExec => MsFlags::MS_NOEXEC,
            MountFlag::Synchronous => MsFlags::MS_SYNCHRONOUS,
            MountFlag::NoAtime => MsFlags::MS_NOATIME,
            MountFlag::NoDirAtime => MsFlags::MS_NODIRATIME,
            MountFlag::RelAtime => MsFlags::MS_RELATIME,
        }
    }

    pub fn mount(
        device: &Path,
        target: &Path,
        fs_type: &str,
        options: &MountOptions,
    ) -> Result<(), FsError> {
        let flags = options
            .flags
            .iter()
            .fold(MsFlags::empty(), |acc, f| acc | ms_flag(*f));
        let data = options.data();

        mount2(Some(device), target, Some(fs_type), flags, data.as_deref())
            .map_err(|e| FsError::io("mount", target, e.into()))?;

        info!(device = %device.display(), target = %target.display(), fs_type, "mounted device");
        Ok(())
    }

    pub fn unmount(target: &Path) -> Result<(), FsError> {
        umount(target).map_err(|e| FsError::io("umount", target, e.into()))?;
        info!(target = %target.display(), "unmounted");
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use crate::options::MountOptions;
    use gcevol_core::FsError;
    use std::path::Path;

    pub fn mount(
        _device: &Path,
        _target: &Path,
        _fs_type: &str,
        _options: &MountOptions,
    ) -> Result<(), FsError> {
        Err(FsError::Unsupported("mount requires Linux".to_string()))
    }

    pub fn unmount(_target: &Path) -> Result<(), FsError> {
        Err(FsError::Unsupported("umount requires Linux".to_string()))
    }
}
