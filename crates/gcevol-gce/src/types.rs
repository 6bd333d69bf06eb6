//! Compute Engine API wire types

use gcevol_core::DiskStatus;
use serde::{Deserialize, Serialize};

/// Body of `disks.insert`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertDisk {
    pub name: String,
    /// int64 fields are carried as strings by the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_snapshot: Option<String>,
}

/// Body of `instances.attachDisk`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    pub source: String,
    pub device_name: String,
    pub mode: String,
    pub auto_delete: bool,
    pub boot: bool,
}

/// One disk in a `disks.list` page
#[derive(Debug, Clone, Deserialize)]
pub struct Disk {
    pub name: String,
    #[serde(default = "unknown_status")]
    pub status: DiskStatus,
}

const fn unknown_status() -> DiskStatus {
    DiskStatus::Unknown
}

/// A `disks.list` page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskList {
    #[serde(default)]
    pub items: Vec<Disk>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Zone operation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub error: Option<OperationErrors>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }

    /// First error message of a finished operation, if any
    pub fn error_message(&self) -> Option<String> {
        let errors = &self.error.as_ref()?.errors;
        let first = errors.first()?;
        Some(
            first
                .message
                .clone()
                .or_else(|| first.code.clone())
                .unwrap_or_else(|| "operation failed".to_string()),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    #[default]
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error envelope returned with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
}

/// Metadata server token reply
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}
