//! Minimal read-only client for the source registry's pull surface.

use crate::error::SyncError;
use crate::layers;
use crate::transport::RateLimitedClient;
use bytes::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use waypost_core::{Digest, Error as CoreError};

/// A repository inside a registry, addressed as `<registry-host>/<name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Repository {
    pub registry: String,
    pub name: String,
}

impl Repository {
    /// A child repository one path level down.
    pub fn child(&self, child: &str) -> Repository {
        Repository {
            registry: self.registry.clone(),
            name: format!("{}/{}", self.name, child),
        }
    }
}

impl FromStr for Repository {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (registry, name) = s
            .split_once('/')
            .ok_or_else(|| CoreError::InvalidReference(format!("missing repository in {s:?}")))?;
        if registry.is_empty() || name.is_empty() {
            return Err(CoreError::InvalidReference(s.to_string()));
        }
        Ok(Self {
            registry: registry.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.name)
    }
}

/// One manifest's entry in a bulk tag listing.
#[derive(Clone, Debug, Deserialize)]
pub struct ManifestSummary {
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    #[serde(default)]
    pub tag: Vec<String>,
}

/// Response of the extended `tags/list` endpoint GCP-hosted registries
/// serve: per-digest manifest summaries (tagged or not) plus child
/// repositories, which is what makes a full walk possible without the
/// catalog API.
#[derive(Clone, Debug, Deserialize)]
pub struct TagsList {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub manifest: HashMap<String, ManifestSummary>,
    #[serde(default)]
    pub child: Vec<String>,
}

/// Read-only registry client; every request passes through the shared
/// rate-limited transport.
pub struct RegistryClient {
    transport: Arc<RateLimitedClient>,
}

impl RegistryClient {
    pub fn new(transport: Arc<RateLimitedClient>) -> Self {
        Self { transport }
    }

    /// List the repository's manifests and child repositories.
    pub async fn list_tags(&self, repo: &Repository) -> Result<TagsList, SyncError> {
        let url = format!(
            "{}/v2/{}/tags/list",
            registry_base(&repo.registry),
            repo.name
        );
        let response = self.transport.get(&url).await?;
        if !response.status().is_success() {
            return Err(SyncError::RegistryStatus {
                url,
                status: response.status(),
            });
        }
        Ok(response.json().await?)
    }

    /// Fetch raw manifest bytes plus the media type the registry declared.
    pub async fn manifest(
        &self,
        repo: &Repository,
        digest: &Digest,
    ) -> Result<(Bytes, String), SyncError> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            registry_base(&repo.registry),
            repo.name,
            digest
        );
        let response = self
            .transport
            .get_with_accept(&url, layers::MANIFEST_ACCEPT)
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::RegistryStatus {
                url,
                status: response.status(),
            });
        }
        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_default();
        Ok((response.bytes().await?, media_type))
    }

    /// Fetch a blob's compressed bytes.
    pub async fn blob(&self, repo: &Repository, digest: &Digest) -> Result<Bytes, SyncError> {
        let url = format!(
            "{}/v2/{}/blobs/{}",
            registry_base(&repo.registry),
            repo.name,
            digest
        );
        let response = self.transport.get(&url).await?;
        if !response.status().is_success() {
            return Err(SyncError::RegistryStatus {
                url,
                status: response.status(),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Scheme selection: loopback registries are plain HTTP (local testing),
/// everything else is HTTPS.
fn registry_base(registry: &str) -> String {
    let host = registry.split(':').next().unwrap_or(registry);
    if host == "localhost" || host == "127.0.0.1" || host == "::1" {
        format!("http://{registry}")
    } else {
        format!("https://{registry}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_parses_registry_and_name() {
        let repo: Repository = "us-central1-docker.pkg.dev/waypost-prod/images"
            .parse()
            .unwrap();
        assert_eq!(repo.registry, "us-central1-docker.pkg.dev");
        assert_eq!(repo.name, "waypost-prod/images");
        assert_eq!(
            repo.to_string(),
            "us-central1-docker.pkg.dev/waypost-prod/images"
        );
    }

    #[test]
    fn repository_child_extends_the_name() {
        let repo: Repository = "registry.example.com/images".parse().unwrap();
        let child = repo.child("pause");
        assert_eq!(child.to_string(), "registry.example.com/images/pause");
    }

    #[test]
    fn bare_host_is_rejected() {
        assert!("registry.example.com".parse::<Repository>().is_err());
        assert!("/name".parse::<Repository>().is_err());
    }

    #[test]
    fn loopback_registries_use_http() {
        assert_eq!(registry_base("127.0.0.1:5000"), "http://127.0.0.1:5000");
        assert_eq!(registry_base("localhost:5000"), "http://localhost:5000");
        assert_eq!(
            registry_base("registry.example.com"),
            "https://registry.example.com"
        );
    }
}
