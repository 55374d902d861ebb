//! Replicates one image's blobs into the destination bucket.

use crate::error::SyncError;
use crate::registry::{RegistryClient, Repository};
use crate::walker::ImageVisitor;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use std::sync::Arc;
use waypost_core::{Digest, ManifestRef};
use waypost_storage::{ObjectStore, PutOptions};

/// Layer blobs live here; this matches the object layout the redirect
/// front-end's mirrors serve.
const LAYER_KEY_PREFIX: &str = "containers/images/";

/// Per-image completion markers. Internal bookkeeping, not for client
/// consumption; the namespace is fixed because existing buckets already
/// carry it.
const IMAGE_RECORD_KEY_PREFIX: &str = "geranos/uploaded-images/";

/// Copies layer blobs and a completion marker for one image at a time.
pub struct ImageUploader {
    store: Arc<dyn ObjectStore>,
    registry: Arc<RegistryClient>,
    /// When false (the default), a layer already present in the bucket is
    /// not re-uploaded.
    reupload_layers: bool,
    dry_run: bool,
}

impl ImageUploader {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<RegistryClient>, dry_run: bool) -> Self {
        Self {
            store,
            registry,
            reupload_layers: false,
            dry_run,
        }
    }

    pub fn key_for_layer(digest: &Digest) -> String {
        format!("{LAYER_KEY_PREFIX}{digest}")
    }

    pub fn key_for_image_record(manifest_digest: &Digest) -> String {
        format!("{IMAGE_RECORD_KEY_PREFIX}{manifest_digest}")
    }

    /// Whether this image's completion marker is already in the bucket.
    pub async fn already_uploaded(&self, manifest_digest: &Digest) -> Result<bool, SyncError> {
        Ok(self
            .store
            .exists(&Self::key_for_image_record(manifest_digest))
            .await?)
    }

    /// Upload every layer, then the manifest marker.
    ///
    /// The marker is written only after all layers succeed, so a partially
    /// replicated image stays invisible to [`Self::already_uploaded`] and
    /// the next walk retries it.
    pub async fn upload_image(
        &self,
        reference: &ManifestRef,
        layer_digests: &[Digest],
    ) -> Result<(), SyncError> {
        let repo: Repository = reference.repository.parse()?;
        for digest in layer_digests {
            let key = Self::key_for_layer(digest);
            if self.skip_existing(&key).await {
                tracing::debug!(key, "layer already exists");
                continue;
            }
            let data = self.registry.blob(&repo, digest).await?;
            self.store_blob(&key, digest, data).await?;
        }

        let (manifest, _media_type) = self.registry.manifest(&repo, &reference.digest).await?;
        let key = Self::key_for_image_record(&reference.digest);
        if self.skip_existing(&key).await {
            tracing::debug!(key, "image record already exists");
            return Ok(());
        }
        self.store_blob(&key, &reference.digest, manifest).await
    }

    /// HEAD-based dedup. A failed existence check is logged and treated as
    /// "absent" so the walk keeps going; the put either succeeds or reports
    /// the real problem.
    async fn skip_existing(&self, key: &str) -> bool {
        if self.reupload_layers {
            return false;
        }
        match self.store.exists(key).await {
            Ok(exists) => exists,
            Err(error) => {
                tracing::error!(key, %error, "failed to check if blob exists");
                false
            }
        }
    }

    async fn store_blob(&self, key: &str, digest: &Digest, data: Bytes) -> Result<(), SyncError> {
        let mut opts = PutOptions::default();
        if digest.is_sha256() {
            let raw = hex::decode(digest.hex())
                .map_err(|e| SyncError::Manifest(format!("bad digest hex {digest}: {e}")))?;
            opts.checksum_sha256 = Some(BASE64.encode(raw));
        }
        tracing::info!(key, "uploading");
        if self.dry_run {
            return Ok(());
        }
        Ok(self.store.put(key, data, opts).await?)
    }
}

#[async_trait]
impl ImageVisitor for ImageUploader {
    async fn already_done(&self, manifest_digest: &Digest) -> bool {
        // an unreadable marker only costs a re-check of the layers
        self.already_uploaded(manifest_digest).await.unwrap_or(false)
    }

    async fn visit(
        &self,
        reference: ManifestRef,
        layer_digests: Vec<Digest>,
    ) -> Result<(), SyncError> {
        tracing::info!(%reference, layers = layer_digests.len(), "processing image");
        self.upload_image(&reference, &layer_digests).await
    }
}
