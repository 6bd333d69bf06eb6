//! Volume plugin request/response shapes and error mapping
//!
//! These mirror the Docker volume plugin protocol field for field, so the
//! transport can serialize them directly.

use crate::disk::OPT_NAME;
use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Protocol name advertised on activation
pub const VOLUME_DRIVER: &str = "VolumeDriver";

/// Inbound request for any volume operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(
        rename = "Opts",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub options: HashMap<String, String>,
    /// Caller identifier sent with Mount/Unmount
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Docker sends `"Opts": null` when no options were given
fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl Request {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add an option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Name of the disk this request acts on, honoring a `Name` option override
    pub fn disk_name(&self) -> &str {
        self.options.get(OPT_NAME).map_or(self.name.as_str(), String::as_str)
    }
}

/// Volume as reported by Get and List
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Mountpoint", default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

impl VolumeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mountpoint: None,
        }
    }

    #[must_use]
    pub fn with_mountpoint(mut self, path: &Path) -> Self {
        self.mountpoint = Some(path.to_string_lossy().into_owned());
        self
    }
}

/// Visibility of volumes created by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
}

/// Driver capability descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "Scope")]
    pub scope: Scope,
}

/// Uniform response for every volume operation
///
/// Failure is signalled only through `err`; a failed response carries no
/// other field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "Err", default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(rename = "Mountpoint", default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
    #[serde(rename = "Volume", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeInfo>,
    #[serde(rename = "Volumes", default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeInfo>,
    #[serde(rename = "Capabilities", default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capability>,
}

impl Response {
    /// Failed response carrying only the error text
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            err: Some(message.into()),
            ..Self::default()
        }
    }

    /// Check if the response reports success
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// Successful outcome of a volume operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Mountpoint(String),
    Volume(Option<VolumeInfo>),
    Volumes(Vec<VolumeInfo>),
    Capabilities(Capability),
}

impl From<Payload> for Response {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Empty => Self::default(),
            Payload::Mountpoint(path) => Self {
                mountpoint: Some(path),
                ..Self::default()
            },
            Payload::Volume(volume) => Self {
                volume,
                ..Self::default()
            },
            Payload::Volumes(volumes) => Self {
                volumes,
                ..Self::default()
            },
            Payload::Capabilities(capability) => Self {
                capabilities: Some(capability),
                ..Self::default()
            },
        }
    }
}

/// Map an operation outcome to its response
pub fn into_response(result: Result<Payload, Error>) -> Response {
    match result {
        Ok(payload) => payload.into(),
        Err(err) => Response::error(err.to_string()),
    }
}

/// Reply to the plugin activation handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateResponse {
    #[serde(rename = "Implements")]
    pub implements: Vec<String>,
}

impl Default for ActivateResponse {
    fn default() -> Self {
        Self {
            implements: vec![VOLUME_DRIVER.to_string()],
        }
    }
}
