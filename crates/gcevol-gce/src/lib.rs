//! gcevol GCE - Compute Engine disk provider
//!
//! Implements [`gcevol_core::DiskProvider`] on top of the Compute Engine v1
//! REST API. Every mutating call returns a zone operation which is polled
//! until it completes or the configured wait timeout elapses.

pub mod auth;
pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use auth::{MetadataClient, TokenSource};
pub use config::GceConfig;
pub use error::{GceError, GceResult};
pub use provider::GceProvider;
