//! gcevol Plugin - Docker volume plugin HTTP surface
//!
//! Docker talks to volume plugins with JSON POSTs over a unix socket in
//! `/run/docker/plugins`. This crate exposes that protocol as an axum
//! [`Router`](axum::Router) over a [`gcevol_core::VolumeDriver`], plus the
//! layered configuration the binary starts from.

pub mod config;
pub mod handlers;
pub mod locks;

pub use config::{LogFormat, PluginConfig};
pub use handlers::{PLUGIN_CONTENT_TYPE, router};
pub use locks::NameLocks;
