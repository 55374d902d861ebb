//! Upstream registry selection and redirect URL composition.

use waypost_cloudmap::{Cloud, IpInfo};
use waypost_core::{RegistryConfig, Upstream};

/// Which of the configured GCP upstreams a region routes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GcpRegistry {
    Us,
    Eu,
    Asia,
}

/// Longest-prefix map over strings.
///
/// GCP keeps adding regions; matching on name prefixes with longest-match
/// semantics gives every future region a deterministic route, which an
/// if/else chain would not.
struct PrefixMap<V> {
    entries: Vec<(&'static str, V)>,
}

impl<V> PrefixMap<V> {
    fn new(mut entries: Vec<(&'static str, V)>) -> Self {
        // longest first, so the first hit is the longest match
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self { entries }
    }

    fn longest_match(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix))
            .map(|(_, value)| value)
    }
}

/// Picks the upstream registry for a classified client.
pub struct UpstreamSelector {
    gcp_regions: PrefixMap<GcpRegistry>,
}

impl UpstreamSelector {
    pub fn new() -> Self {
        Self {
            gcp_regions: PrefixMap::new(vec![
                ("europe", GcpRegistry::Eu),
                ("me-", GcpRegistry::Eu),
                ("africa", GcpRegistry::Eu),
                ("asia", GcpRegistry::Asia),
                ("australia", GcpRegistry::Asia),
                ("us-", GcpRegistry::Us),
                ("northamerica", GcpRegistry::Us),
                ("southamerica", GcpRegistry::Us),
            ]),
        }
    }

    /// The upstream serving `info`, or `default` for unclassified clients
    /// and clouds without a dedicated upstream.
    ///
    /// Azure clients always go to the Azure registry (its token dance needs
    /// to happen against the registry that will serve them); GCP clients go
    /// to the geographically matching GCP registry, defaulting to the US
    /// one for regions the table has never heard of.
    pub fn select<'a>(
        &self,
        rc: &'a RegistryConfig,
        info: Option<IpInfo>,
        default: &'a Upstream,
    ) -> &'a Upstream {
        match info {
            Some(info) if info.cloud == Cloud::Azure => &rc.upstream_azure,
            Some(info) if info.cloud == Cloud::Gcp => {
                match self.gcp_regions.longest_match(info.region) {
                    Some(GcpRegistry::Eu) => &rc.upstream_eu,
                    Some(GcpRegistry::Asia) => &rc.upstream_asia,
                    Some(GcpRegistry::Us) | None => &rc.upstream_us,
                }
            }
            _ => default,
        }
    }
}

impl Default for UpstreamSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Compose the redirect URL for forwarding `original_path` to `upstream`,
/// inserting the upstream's namespace after `/v2/`.
///
/// Joining collapses duplicate slashes but never decodes anything, so
/// percent-encoding in the request path reaches the upstream unchanged.
pub fn upstream_redirect_url(upstream: &Upstream, original_path: &str) -> String {
    let suffix = original_path.strip_prefix("/v2").unwrap_or(original_path);
    let mut url = upstream.endpoint.trim_end_matches('/').to_string();
    for part in ["v2", upstream.namespace.as_str(), suffix] {
        for segment in part.split('/').filter(|s| !s.is_empty()) {
            url.push('/');
            url.push_str(segment);
        }
    }
    if suffix.ends_with('/') && !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcp(region: &'static str) -> Option<IpInfo> {
        Some(IpInfo {
            cloud: Cloud::Gcp,
            region,
        })
    }

    #[test]
    fn selection_table_rows() {
        let rc = RegistryConfig::for_testing();
        let selector = UpstreamSelector::new();
        let default = &rc.upstream_cdn;

        let azure = Some(IpInfo {
            cloud: Cloud::Azure,
            region: "westeurope",
        });
        assert_eq!(selector.select(&rc, azure, default), &rc.upstream_azure);

        assert_eq!(selector.select(&rc, gcp("europe-west1"), default), &rc.upstream_eu);
        assert_eq!(selector.select(&rc, gcp("me-west1"), default), &rc.upstream_eu);
        assert_eq!(selector.select(&rc, gcp("africa-south1"), default), &rc.upstream_eu);
        assert_eq!(selector.select(&rc, gcp("asia-east1"), default), &rc.upstream_asia);
        assert_eq!(
            selector.select(&rc, gcp("australia-southeast1"), default),
            &rc.upstream_asia
        );
        assert_eq!(selector.select(&rc, gcp("us-central1"), default), &rc.upstream_us);
        assert_eq!(
            selector.select(&rc, gcp("northamerica-northeast1"), default),
            &rc.upstream_us
        );
        assert_eq!(
            selector.select(&rc, gcp("southamerica-east1"), default),
            &rc.upstream_us
        );

        let aws = Some(IpInfo {
            cloud: Cloud::Aws,
            region: "eu-west-3",
        });
        assert_eq!(selector.select(&rc, aws, default), default);
        assert_eq!(selector.select(&rc, None, default), default);
    }

    // regions GCP invents later must still route deterministically
    #[test]
    fn future_gcp_regions_route_deterministically() {
        let rc = RegistryConfig::for_testing();
        let selector = UpstreamSelector::new();
        let default = &rc.upstream_cdn;

        assert_eq!(selector.select(&rc, gcp("us-newregion9"), default), &rc.upstream_us);
        assert_eq!(selector.select(&rc, gcp("europe-north7"), default), &rc.upstream_eu);
        assert_eq!(selector.select(&rc, gcp("asia-west5"), default), &rc.upstream_asia);
        // no prefix matches at all: default GCP registry is the US one
        assert_eq!(selector.select(&rc, gcp("antarctica-south1"), default), &rc.upstream_us);
    }

    #[test]
    fn redirect_url_inserts_namespace() {
        let upstream = Upstream {
            endpoint: "https://us-docker.pkg.dev".to_string(),
            namespace: "waypost-test/images".to_string(),
        };
        assert_eq!(
            upstream_redirect_url(&upstream, "/v2/pause/blobs/sha256:da86"),
            "https://us-docker.pkg.dev/v2/waypost-test/images/pause/blobs/sha256:da86"
        );
    }

    #[test]
    fn redirect_url_with_empty_namespace() {
        let upstream = Upstream {
            endpoint: "https://cdn.test.waypost.dev".to_string(),
            namespace: String::new(),
        };
        assert_eq!(
            upstream_redirect_url(&upstream, "/v2/pause/manifests/latest"),
            "https://cdn.test.waypost.dev/v2/pause/manifests/latest"
        );
    }

    #[test]
    fn redirect_url_collapses_duplicate_slashes() {
        let upstream = Upstream {
            endpoint: "https://example.com/".to_string(),
            namespace: "/ns/".to_string(),
        };
        assert_eq!(
            upstream_redirect_url(&upstream, "/v2//repo//blobs/sha256:ab"),
            "https://example.com/v2/ns/repo/blobs/sha256:ab"
        );
    }

    #[test]
    fn redirect_url_preserves_api_probe_trailing_slash() {
        let upstream = Upstream {
            endpoint: "https://wayposttest.azurecr.io".to_string(),
            namespace: String::new(),
        };
        assert_eq!(
            upstream_redirect_url(&upstream, "/v2/"),
            "https://wayposttest.azurecr.io/v2/"
        );
        assert_eq!(
            upstream_redirect_url(&upstream, "/v2"),
            "https://wayposttest.azurecr.io/v2"
        );
    }

    #[test]
    fn redirect_url_keeps_percent_encoding() {
        let upstream = Upstream {
            endpoint: "https://example.com".to_string(),
            namespace: String::new(),
        };
        assert_eq!(
            upstream_redirect_url(&upstream, "/v2/pause/blobs/sha256%3Aab"),
            "https://example.com/v2/pause/blobs/sha256%3Aab"
        );
    }
}
