//! S3 storage backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectStore, PutOptions};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

/// Destination bucket backed by S3.
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Connect to `bucket` in `region` with the default credential chain.
    pub async fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self {
            client: Client::new(&config),
            bucket: bucket.into(),
        }
    }

    /// Connect with anonymous credentials. Reads (HeadObject against public
    /// buckets) still work; every write is rejected by the service, which is
    /// what makes dry-run incapable of mutating anything.
    pub async fn new_anonymous(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .no_credentials()
            .load()
            .await;
        Self {
            client: Client::new(&config),
            bucket: bucket.into(),
        }
    }

    fn check_key(key: &str) -> StorageResult<()> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Self::check_key(key)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(StorageError::S3(Box::new(err))),
        }
    }

    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> StorageResult<()> {
        Self::check_key(key)?;
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));
        if let Some(checksum) = opts.checksum_sha256 {
            req = req.checksum_sha256(checksum);
        }
        req.send()
            .await
            .map_err(|err| StorageError::S3(Box::new(err)))?;
        tracing::debug!(bucket = %self.bucket, key, "stored object");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
