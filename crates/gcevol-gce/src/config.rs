//! Compute Engine provider configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public Compute Engine v1 endpoint
pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// In-instance metadata server
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal/computeMetadata/v1";

/// Identity and tuning of the Compute Engine provider
///
/// Empty `project`, `zone` or `instance` are filled in from the metadata
/// server by [`crate::GceProvider::discover`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GceConfig {
    /// Project that owns the disks
    #[serde(default)]
    pub project: String,
    /// Zone of the disks and of this instance
    #[serde(default)]
    pub zone: String,
    /// Instance disks are attached to
    #[serde(default)]
    pub instance: String,
    /// Compute API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Metadata server base URL
    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,
    /// Static OAuth access token; when unset the metadata server is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// How long to wait for an operation to finish, in milliseconds
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Delay between operation polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout for a single HTTP request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_metadata_endpoint() -> String {
    DEFAULT_METADATA_ENDPOINT.to_string()
}

const fn default_wait_timeout_ms() -> u64 {
    100_000
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for GceConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            zone: String::new(),
            instance: String::new(),
            endpoint: default_endpoint(),
            metadata_endpoint: default_metadata_endpoint(),
            access_token: None,
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl GceConfig {
    /// Create a config for a known project, zone and instance
    pub fn new(
        project: impl Into<String>,
        zone: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            zone: zone.into(),
            instance: instance.into(),
            ..Self::default()
        }
    }

    /// Set the Compute API endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the metadata server endpoint
    #[must_use]
    pub fn with_metadata_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metadata_endpoint = endpoint.into();
        self
    }

    /// Use a static access token
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the operation wait timeout
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the operation poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check if project, zone and instance are all known
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.project.is_empty() && !self.zone.is_empty() && !self.instance.is_empty()
    }

    /// Base URL for zonal resources
    pub fn zone_url(&self) -> String {
        format!(
            "{}/projects/{}/zones/{}",
            self.endpoint.trim_end_matches('/'),
            self.project,
            self.zone
        )
    }

    /// Relative resource path of a disk, as used in attach requests
    pub fn disk_source(&self, name: &str) -> String {
        format!("projects/{}/zones/{}/disks/{}", self.project, self.zone, name)
    }

    /// Disk type URL for a short type name such as `pd-ssd`
    pub fn disk_type(&self, disk_type: &str) -> String {
        if disk_type.contains('/') {
            disk_type.to_string()
        } else {
            format!("zones/{}/diskTypes/{}", self.zone, disk_type)
        }
    }

    /// Snapshot URL for a short snapshot name
    pub fn snapshot(&self, snapshot: &str) -> String {
        if snapshot.contains('/') {
            snapshot.to_string()
        } else {
            format!("global/snapshots/{snapshot}")
        }
    }

    /// Image URL for a short image name
    pub fn image(&self, image: &str) -> String {
        if image.contains('/') {
            image.to_string()
        } else {
            format!("projects/{}/global/images/{}", self.project, image)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: GceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GceConfig::default());
        assert_eq!(config.wait_timeout(), Duration::from_secs(100));
        assert!(!config.is_resolved());
    }

    #[test]
    fn test_resource_urls() {
        let config = GceConfig::new("proj", "us-central1-a", "vm-1");
        assert!(config.is_resolved());
        assert_eq!(
            config.zone_url(),
            "https://compute.googleapis.com/compute/v1/projects/proj/zones/us-central1-a"
        );
        assert_eq!(
            config.disk_source("data1"),
            "projects/proj/zones/us-central1-a/disks/data1"
        );
        assert_eq!(
            config.disk_type("pd-ssd"),
            "zones/us-central1-a/diskTypes/pd-ssd"
        );
        assert_eq!(config.snapshot("snap"), "global/snapshots/snap");
        assert_eq!(
            config.image("projects/debian-cloud/global/images/family/debian-12"),
            "projects/debian-cloud/global/images/family/debian-12"
        );
        assert_eq!(config.image("img"), "projects/proj/global/images/img");
    }
}
