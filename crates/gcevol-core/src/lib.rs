//! gcevol Core - volume orchestration for remote block disks
//!
//! This crate turns a logical volume name plus loosely-typed plugin options
//! into a validated [`DiskConfig`], then drives two collaborators through
//! their lifecycles:
//!
//! ```text
//!            ┌──────────────────┐
//! request ──►│   VolumeDriver   │──► Response { Err, Mountpoint, ... }
//!            └───┬──────────┬───┘
//!                │          │
//!     ┌──────────▼───┐  ┌───▼──────────┐
//!     │ DiskProvider │  │  Filesystem  │
//!     │ create/list/ │  │ stat/mkdir/  │
//!     │ attach/...   │  │ format/mount │
//!     └──────────────┘  └──────────────┘
//! ```
//!
//! The driver keeps no state between calls. Every operation re-derives the
//! disk configuration and asks the provider and the filesystem for the
//! current truth.

pub mod disk;
pub mod driver;
pub mod error;
pub mod fs;
pub mod protocol;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use disk::{DEFAULT_DEVICE_PREFIX, DiskConfig, DiskOptions, MAX_SIZE_GB};
pub use driver::{DEFAULT_ROOT, VolumeDriver, VolumeDriverConfig};
pub use error::{ConfigError, Error, FsError, ProviderError, Result};
pub use fs::{Filesystem, MOUNT_POINT_MODE, PathStat};
pub use protocol::{ActivateResponse, Capability, Request, Response, Scope, VolumeInfo};
pub use provider::{DiskProvider, DiskStatus, DiskSummary};
