//! Waypost sync library.
//!
//! Walks a source registry, resolves every manifest to its layer blobs, and
//! replicates the blobs into a destination mirror bucket under
//! content-addressed keys, recording a per-image completion marker. All
//! registry reads share one process-wide rate limit.

pub mod error;
pub mod layers;
pub mod registry;
pub mod transport;
pub mod uploader;
pub mod walker;

pub use error::SyncError;
pub use registry::{RegistryClient, Repository};
pub use transport::RateLimitedClient;
pub use uploader::ImageUploader;
pub use walker::{ImageVisitor, Walker};
