//! Plugin configuration
//!
//! Sources are layered lowest to highest: built-in defaults, the TOML file,
//! `GCEVOL__SECTION__KEY` environment variables. Command-line flags are
//! applied on top by the binary.

use gcevol_core::{DEFAULT_DEVICE_PREFIX, DEFAULT_ROOT, VolumeDriverConfig};
use gcevol_gce::GceConfig;
use gcevol_host::{FormatPolicy, HostConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "GCEVOL";

/// Top-level configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub plugin: ListenerConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
    #[serde(default)]
    pub gce: GceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the plugin API is served
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Plugin name; Docker finds the socket as `<socket_dir>/<name>.sock`
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,
    /// Serve over TCP instead of the unix socket
    #[serde(default)]
    pub listen: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            socket_dir: default_socket_dir(),
            listen: None,
        }
    }
}

impl ListenerConfig {
    /// Full path of the unix socket
    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.join(format!("{}.sock", self.name))
    }
}

/// Mount layout and local filesystem settings
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub format_policy: FormatPolicy,
    #[serde(default = "default_fs_type")]
    pub fs_type: String,
    #[serde(default = "default_mount_options")]
    pub mount_options: String,
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            format_policy: FormatPolicy::default(),
            fs_type: default_fs_type(),
            mount_options: default_mount_options(),
            device_prefix: default_device_prefix(),
        }
    }
}

impl VolumeConfig {
    pub fn driver_config(&self) -> VolumeDriverConfig {
        VolumeDriverConfig {
            root: self.root.clone(),
            device_prefix: self.device_prefix.clone(),
        }
    }

    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            fs_type: self.fs_type.clone(),
            mount_options: self.mount_options.clone(),
            format_policy: self.format_policy,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_name() -> String {
    "gce".to_string()
}

fn default_socket_dir() -> PathBuf {
    PathBuf::from("/run/docker/plugins")
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_fs_type() -> String {
    HostConfig::default().fs_type
}

fn default_mount_options() -> String {
    HostConfig::default().mount_options
}

fn default_device_prefix() -> String {
    DEFAULT_DEVICE_PREFIX.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PluginConfig {
    /// Load from an optional TOML file and the process environment
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = PluginConfig::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.plugin.socket_path(), Path::new("/run/docker/plugins/gce.sock"));
        assert!(config.plugin.listen.is_none());
        assert_eq!(config.volume.root, Path::new("/mnt/"));
        assert_eq!(config.volume.format_policy, FormatPolicy::Always);
        assert_eq!(config.gce.wait_timeout(), Duration::from_secs(100));
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugin.toml");
        std::fs::write(
            &path,
            r#"
[plugin]
name = "gcevol"
listen = "127.0.0.1:8080"

[volume]
root = "/var/lib/gcevol"
format_policy = "if-unformatted"
fs_type = "xfs"

[gce]
project = "proj"
zone = "us-central1-a"
wait_timeout_ms = 5000

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = PluginConfig::load(&path).unwrap();
        assert_eq!(config.plugin.name, "gcevol");
        assert_eq!(config.plugin.listen.as_deref(), Some("127.0.0.1:8080"));

        let host = config.volume.host_config();
        assert_eq!(host.fs_type, "xfs");
        assert_eq!(host.format_policy, FormatPolicy::IfUnformatted);
        assert_eq!(host.mount_options, "discard,defaults");

        let driver = config.volume.driver_config();
        assert_eq!(driver.root, Path::new("/var/lib/gcevol"));
        assert_eq!(driver.device_prefix, DEFAULT_DEVICE_PREFIX);

        assert_eq!(config.gce.project, "proj");
        assert!(config.gce.instance.is_empty());
        assert_eq!(config.gce.wait_timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugin.toml");
        std::fs::write(&path, "[volume\nroot = ").unwrap();

        assert!(PluginConfig::load(&path).is_err());
    }
}
