//! Object storage abstraction for Waypost's mirror buckets.
//!
//! The sync tool only ever needs two capabilities against a destination
//! bucket: "is this key present" and "write these bytes under this key".
//! [`ObjectStore`] pins exactly that surface so the uploader can be exercised
//! against [`MemoryBackend`] in tests and [`S3Backend`] in production.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::memory::MemoryBackend;
pub use backends::s3::S3Backend;
pub use error::{StorageError, StorageResult};
pub use traits::{ObjectStore, PutOptions};
