//! Core domain types shared by the Waypost redirector and sync tool.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content digests and manifest references
//! - Upstream registry endpoints and server configuration

pub mod config;
pub mod digest;
pub mod error;

pub use config::{RegistryConfig, ServerConfig, Upstream};
pub use digest::{Digest, ManifestRef};
pub use error::{Error, Result};
