//! Configuration types shared across crates.
//!
//! The redirect service is configured entirely through environment variables
//! (it runs as a serverless container); [`ServerConfig::from_env`] merges them
//! over compiled defaults.

use crate::error::{Error, Result};
use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

/// Raw server configuration, one field per recognized environment variable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Redirect target for `/` (`INFO_URL`).
    #[serde(default = "default_info_url")]
    pub info_url: String,
    /// Redirect target for `/privacy` (`PRIVACY_URL`).
    #[serde(default = "default_privacy_url")]
    pub privacy_url: String,
    /// Enable the `/metrics` endpoint (`METRICS_ENABLED`).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    #[serde(default = "default_us_endpoint")]
    pub upstream_us_endpoint: String,
    #[serde(default = "default_namespace")]
    pub upstream_us_namespace: String,
    #[serde(default = "default_eu_endpoint")]
    pub upstream_eu_endpoint: String,
    #[serde(default = "default_namespace")]
    pub upstream_eu_namespace: String,
    #[serde(default = "default_asia_endpoint")]
    pub upstream_asia_endpoint: String,
    #[serde(default = "default_namespace")]
    pub upstream_asia_namespace: String,
    #[serde(default = "default_azure_endpoint")]
    pub upstream_azure_endpoint: String,
    #[serde(default)]
    pub upstream_azure_namespace: String,
    #[serde(default = "default_cdn_endpoint")]
    pub upstream_cdn_endpoint: String,
    #[serde(default)]
    pub upstream_cdn_namespace: String,
}

fn default_port() -> u16 {
    8080
}

fn default_info_url() -> String {
    "https://waypost.dev/".to_string()
}

fn default_privacy_url() -> String {
    "https://waypost.dev/privacy/".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_us_endpoint() -> String {
    "https://us-docker.pkg.dev".to_string()
}

fn default_eu_endpoint() -> String {
    "https://europe-docker.pkg.dev".to_string()
}

fn default_asia_endpoint() -> String {
    "https://asia-docker.pkg.dev".to_string()
}

fn default_azure_endpoint() -> String {
    "https://waypostprod.azurecr.io".to_string()
}

fn default_cdn_endpoint() -> String {
    "https://cdn.waypost.dev".to_string()
}

fn default_namespace() -> String {
    "waypost-prod/images".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            info_url: default_info_url(),
            privacy_url: default_privacy_url(),
            metrics_enabled: default_metrics_enabled(),
            upstream_us_endpoint: default_us_endpoint(),
            upstream_us_namespace: default_namespace(),
            upstream_eu_endpoint: default_eu_endpoint(),
            upstream_eu_namespace: default_namespace(),
            upstream_asia_endpoint: default_asia_endpoint(),
            upstream_asia_namespace: default_namespace(),
            upstream_azure_endpoint: default_azure_endpoint(),
            upstream_azure_namespace: String::new(),
            upstream_cdn_endpoint: default_cdn_endpoint(),
            upstream_cdn_namespace: String::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Env::raw().only(&[
                "port",
                "info_url",
                "privacy_url",
                "metrics_enabled",
                "upstream_us_endpoint",
                "upstream_us_namespace",
                "upstream_eu_endpoint",
                "upstream_eu_namespace",
                "upstream_asia_endpoint",
                "upstream_asia_namespace",
                "upstream_azure_endpoint",
                "upstream_azure_namespace",
                "upstream_cdn_endpoint",
                "upstream_cdn_namespace",
            ]))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

/// An upstream registry: an endpoint plus the path namespace it demands
/// between `/v2/` and the repository name (may be empty).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upstream {
    pub endpoint: String,
    pub namespace: String,
}

/// Immutable registry configuration, captured once at startup.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub upstream_us: Upstream,
    pub upstream_eu: Upstream,
    pub upstream_asia: Upstream,
    pub upstream_azure: Upstream,
    pub upstream_cdn: Upstream,
    pub info_url: String,
    pub privacy_url: String,
}

impl RegistryConfig {
    /// Build the immutable registry view of a raw [`ServerConfig`].
    pub fn from_server_config(cfg: &ServerConfig) -> Result<Self> {
        let rc = Self {
            upstream_us: Upstream {
                endpoint: cfg.upstream_us_endpoint.clone(),
                namespace: cfg.upstream_us_namespace.clone(),
            },
            upstream_eu: Upstream {
                endpoint: cfg.upstream_eu_endpoint.clone(),
                namespace: cfg.upstream_eu_namespace.clone(),
            },
            upstream_asia: Upstream {
                endpoint: cfg.upstream_asia_endpoint.clone(),
                namespace: cfg.upstream_asia_namespace.clone(),
            },
            upstream_azure: Upstream {
                endpoint: cfg.upstream_azure_endpoint.clone(),
                namespace: cfg.upstream_azure_namespace.clone(),
            },
            upstream_cdn: Upstream {
                endpoint: cfg.upstream_cdn_endpoint.clone(),
                namespace: cfg.upstream_cdn_namespace.clone(),
            },
            info_url: cfg.info_url.clone(),
            privacy_url: cfg.privacy_url.clone(),
        };
        rc.validate()?;
        Ok(rc)
    }

    /// Fail fast on endpoints that cannot produce a valid redirect.
    fn validate(&self) -> Result<()> {
        for (name, upstream) in [
            ("US", &self.upstream_us),
            ("EU", &self.upstream_eu),
            ("Asia", &self.upstream_asia),
            ("Azure", &self.upstream_azure),
            ("CDN", &self.upstream_cdn),
        ] {
            if !upstream.endpoint.starts_with("http://")
                && !upstream.endpoint.starts_with("https://")
            {
                return Err(Error::Config(format!(
                    "{name} upstream endpoint is not an http(s) URL: {:?}",
                    upstream.endpoint
                )));
            }
        }
        Ok(())
    }

    /// Create a test configuration with distinct, recognizable endpoints.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            upstream_us: Upstream {
                endpoint: "https://us-docker.pkg.dev".to_string(),
                namespace: "waypost-test/images".to_string(),
            },
            upstream_eu: Upstream {
                endpoint: "https://europe-docker.pkg.dev".to_string(),
                namespace: "waypost-test/images".to_string(),
            },
            upstream_asia: Upstream {
                endpoint: "https://asia-docker.pkg.dev".to_string(),
                namespace: "waypost-test/images".to_string(),
            },
            upstream_azure: Upstream {
                endpoint: "https://wayposttest.azurecr.io".to_string(),
                namespace: String::new(),
            },
            upstream_cdn: Upstream {
                endpoint: "https://cdn.test.waypost.dev".to_string(),
                namespace: String::new(),
            },
            info_url: "https://waypost.dev/".to_string(),
            privacy_url: "https://waypost.dev/privacy/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ServerConfig::default();
        let rc = RegistryConfig::from_server_config(&cfg).unwrap();
        assert_eq!(rc.info_url, cfg.info_url);
        assert_eq!(rc.upstream_us.namespace, "waypost-prod/images");
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let cfg = ServerConfig {
            upstream_azure_endpoint: "waypostprod.azurecr.io".to_string(),
            ..ServerConfig::default()
        };
        let err = RegistryConfig::from_server_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("Azure"));
    }

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORT", "9090");
            jail.set_env("INFO_URL", "https://example.com/about");
            let cfg = ServerConfig::from_env().unwrap();
            assert_eq!(cfg.port, 9090);
            assert_eq!(cfg.info_url, "https://example.com/about");
            assert_eq!(cfg.privacy_url, default_privacy_url());
            Ok(())
        });
    }
}
