//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Options attached to a single put.
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// Base64 encoding of the raw (not hex) SHA-256 digest of the body.
    /// When set, backends that support checksum metadata attach it so the
    /// store verifies the bytes server-side.
    pub checksum_sha256: Option<String>,
}

/// Destination bucket abstraction for content-addressed writes.
///
/// Keys are full object keys (e.g. `containers/images/sha256:…`); the backend
/// is already scoped to one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Write an object.
    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> StorageResult<()>;

    /// Static identifier for the backend type, for logs.
    fn backend_name(&self) -> &'static str;
}
