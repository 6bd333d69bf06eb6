//! gcevol Host - local filesystem operations
//!
//! [`HostFilesystem`] implements [`gcevol_core::Filesystem`] for a Linux
//! host: stat and directory creation through `tokio::fs`, formatting through
//! the `mkfs.<type>` tools, and mount/unmount through the `mount(2)` and
//! `umount(2)` syscalls.

pub mod config;
pub mod filesystem;
pub mod options;

pub use config::{FormatPolicy, HostConfig};
pub use filesystem::HostFilesystem;
pub use options::MountOptions;
