//! Host filesystem configuration

use serde::{Deserialize, Serialize};

/// When `format` actually runs mkfs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatPolicy {
    /// Run mkfs on every mount, destroying existing data
    #[default]
    Always,
    /// Probe the device and skip mkfs when it already carries a filesystem
    IfUnformatted,
}

/// Settings for [`crate::HostFilesystem`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Filesystem type created and mounted
    #[serde(default = "default_fs_type")]
    pub fs_type: String,
    /// Comma-separated mount options
    #[serde(default = "default_mount_options")]
    pub mount_options: String,
    #[serde(default)]
    pub format_policy: FormatPolicy,
}

fn default_fs_type() -> String {
    "ext4".to_string()
}

fn default_mount_options() -> String {
    "discard,defaults".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fs_type: default_fs_type(),
            mount_options: default_mount_options(),
            format_policy: FormatPolicy::default(),
        }
    }
}
