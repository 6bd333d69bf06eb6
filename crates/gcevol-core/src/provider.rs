//! Remote disk provider abstraction

use crate::disk::DiskConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Readiness status reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiskStatus {
    Creating,
    Restoring,
    Failed,
    Ready,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl DiskStatus {
    /// Check if the disk can be used
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// A disk as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSummary {
    pub name: String,
    pub status: DiskStatus,
}

impl DiskSummary {
    pub fn new(name: impl Into<String>, status: DiskStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Manages the lifecycle of remote disks
///
/// Every method blocks until the remote side reports completion; any error is
/// fatal for the current request.
#[async_trait]
pub trait DiskProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Create a disk
    async fn create(&self, config: &DiskConfig) -> Result<(), ProviderError>;

    /// List all disks with their status
    async fn list(&self) -> Result<Vec<DiskSummary>, ProviderError>;

    /// Attach a disk to this host
    async fn attach(&self, config: &DiskConfig) -> Result<(), ProviderError>;

    /// Detach a disk from this host
    async fn detach(&self, config: &DiskConfig) -> Result<(), ProviderError>;

    /// Delete a disk
    async fn delete(&self, config: &DiskConfig) -> Result<(), ProviderError>;
}
