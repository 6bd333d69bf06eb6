//! Disk configuration derived from plugin requests
//!
//! A [`DiskConfig`] is built fresh for every request from the volume name and
//! the request's option map. Derivation is pure: no provider or filesystem
//! call happens until the configuration has been fully validated.

use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix of the stable device link the host creates for an attached disk
pub const DEFAULT_DEVICE_PREFIX: &str = "/dev/disk/by-id/google-";

/// Largest disk size accepted, in GB
pub const MAX_SIZE_GB: i64 = 65_536;

/// Longest accepted disk name
const MAX_NAME_LEN: usize = 63;

pub(crate) const OPT_NAME: &str = "Name";
const OPT_TYPE: &str = "Type";
const OPT_SIZE_GB: &str = "SizeGb";
const OPT_SOURCE_SNAPSHOT: &str = "SourceSnapshot";
const OPT_SOURCE_IMAGE: &str = "SourceImage";

/// Typed view of the request options
///
/// The set of keys is closed: anything other than `Name`, `Type`, `SizeGb`,
/// `SourceSnapshot` and `SourceImage` is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskOptions {
    pub name: Option<String>,
    pub disk_type: Option<String>,
    pub size_gb: Option<i64>,
    pub source_snapshot: Option<String>,
    pub source_image: Option<String>,
}

impl DiskOptions {
    /// Parse a plugin option map
    ///
    /// Keys are visited in sorted order so the reported error does not depend
    /// on map iteration order.
    pub fn from_map(options: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut keys: Vec<&String> = options.keys().collect();
        keys.sort();

        let mut parsed = Self::default();
        for key in keys {
            let value = &options[key];
            match key.as_str() {
                OPT_NAME => parsed.name = Some(value.clone()),
                OPT_TYPE => parsed.disk_type = Some(value.clone()),
                OPT_SIZE_GB => {
                    let size = value
                        .parse::<i64>()
                        .map_err(|source| ConfigError::InvalidSize {
                            value: value.clone(),
                            source,
                        })?;
                    parsed.size_gb = Some(size);
                }
                OPT_SOURCE_SNAPSHOT => parsed.source_snapshot = Some(value.clone()),
                OPT_SOURCE_IMAGE => parsed.source_image = Some(value.clone()),
                _ => return Err(ConfigError::UnknownOption(key.clone())),
            }
        }

        Ok(parsed)
    }
}

/// Provisioning parameters of one remote disk and its local mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskConfig {
    /// Remote disk name, also the volume name
    pub name: String,
    /// Disk type (storage tier), opaque to the driver
    pub disk_type: Option<String>,
    /// Requested size in GB
    pub size_gb: Option<i64>,
    /// Snapshot to provision from
    pub source_snapshot: Option<String>,
    /// Image to provision from
    pub source_image: Option<String>,
}

impl DiskConfig {
    /// Create a configuration with only a name set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disk_type: None,
            size_gb: None,
            source_snapshot: None,
            source_image: None,
        }
    }

    /// Derive and validate a configuration for `volume` from request options
    pub fn derive(volume: &str, options: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = Self::new(volume).with_options(DiskOptions::from_map(options)?);
        config.validate()?;
        Ok(config)
    }

    /// Apply parsed options on top of this configuration
    #[must_use]
    pub fn with_options(mut self, options: DiskOptions) -> Self {
        if let Some(name) = options.name {
            self.name = name;
        }
        if options.disk_type.is_some() {
            self.disk_type = options.disk_type;
        }
        if options.size_gb.is_some() {
            self.size_gb = options.size_gb;
        }
        if options.source_snapshot.is_some() {
            self.source_snapshot = options.source_snapshot;
        }
        if options.source_image.is_some() {
            self.source_image = options.source_image;
        }
        self
    }

    /// Check the configuration, returning the first violation found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if !is_valid_disk_name(&self.name) {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }
        if let Some(size) = self.size_gb {
            if size < 0 {
                return Err(ConfigError::NegativeSize(size));
            }
            if size > MAX_SIZE_GB {
                return Err(ConfigError::SizeTooLarge {
                    size,
                    max: MAX_SIZE_GB,
                });
            }
        }
        if self.source_snapshot.is_some() && self.source_image.is_some() {
            return Err(ConfigError::ConflictingSources);
        }
        Ok(())
    }

    /// Device path the disk appears at once attached
    #[must_use]
    pub fn device_path(&self, prefix: &str) -> PathBuf {
        PathBuf::from(format!("{prefix}{}", self.name))
    }

    /// Local mount point under `root`
    #[must_use]
    pub fn mount_point(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}

/// Remote disk names: a lowercase letter, then lowercase letters, digits or
/// hyphens, not ending in a hyphen. Such a name is always a single path
/// component, so the mount point cannot escape the root.
fn is_valid_disk_name(name: &str) -> bool {
    if name.len() > MAX_NAME_LEN || name.ends_with('-') {
        return false;
    }
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
