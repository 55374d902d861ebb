//! Manifest parsing: resolving a manifest's bytes to its layer digests.

use crate::error::SyncError;
use serde::Deserialize;
use waypost_core::Digest;

pub const DOCKER_MANIFEST_SCHEMA2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_MANIFEST_SCHEMA1: &str = "application/vnd.docker.distribution.manifest.v1+json";
pub const DOCKER_MANIFEST_SCHEMA1_SIGNED: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";
pub const OCI_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Accept header offered on manifest fetches.
pub const MANIFEST_ACCEPT: &str = concat!(
    "application/vnd.docker.distribution.manifest.v2+json, ",
    "application/vnd.oci.image.manifest.v1+json, ",
    "application/vnd.docker.distribution.manifest.v1+prettyjws, ",
    "application/vnd.docker.distribution.manifest.v1+json",
);

/// Whether this media type is a multi-arch wrapper rather than an image.
pub fn is_index(media_type: &str) -> bool {
    media_type == DOCKER_MANIFEST_LIST || media_type == OCI_IMAGE_INDEX
}

#[derive(Deserialize)]
struct ImageManifest {
    #[serde(default)]
    layers: Vec<Descriptor>,
}

#[derive(Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Deserialize)]
struct Schema1Manifest {
    #[serde(rename = "fsLayers", default)]
    fs_layers: Vec<FsLayer>,
}

#[derive(Deserialize)]
struct FsLayer {
    #[serde(rename = "blobSum")]
    blob_sum: String,
}

/// The ordered layer digests of an image manifest.
///
/// Config blobs are deliberately not included; the mirror layout tracks
/// layer blobs only.
///
/// Index media types are the caller's problem (the walker's enumeration
/// already resolves them to child images); here they come back as
/// [`SyncError::UnhandledMediaType`] like anything else unrecognized.
pub fn layers_for_manifest(media_type: &str, raw: &[u8]) -> Result<Vec<Digest>, SyncError> {
    match media_type {
        DOCKER_MANIFEST_SCHEMA2 | OCI_IMAGE_MANIFEST => {
            let manifest: ImageManifest =
                serde_json::from_slice(raw).map_err(|e| SyncError::Manifest(e.to_string()))?;
            manifest
                .layers
                .into_iter()
                .map(|d| d.digest.parse().map_err(SyncError::from))
                .collect()
        }
        DOCKER_MANIFEST_SCHEMA1 | DOCKER_MANIFEST_SCHEMA1_SIGNED => {
            let manifest: Schema1Manifest =
                serde_json::from_slice(raw).map_err(|e| SyncError::Manifest(e.to_string()))?;
            // schema 1 lists the base layer last; flip to outermost-last and
            // drop the consecutive duplicates it emits for empty layers
            let mut digests = manifest
                .fs_layers
                .into_iter()
                .rev()
                .map(|l| l.blob_sum.parse().map_err(SyncError::from))
                .collect::<Result<Vec<Digest>, _>>()?;
            digests.dedup();
            Ok(digests)
        }
        other => Err(SyncError::UnhandledMediaType(other.to_string())),
    }
}
