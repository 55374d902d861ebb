//! Application state shared across requests.

use crate::blobcheck::BlobChecker;
use crate::upstreams::UpstreamSelector;
use std::sync::Arc;
use waypost_cloudmap::{IpInfo, TrieMap};
use waypost_core::RegistryConfig;

/// Shared application state.
///
/// Everything here is built once at startup and read-only afterwards (the
/// blob checker's cache is internally synchronized), so requests share it
/// without locking.
#[derive(Clone)]
pub struct AppState {
    /// Immutable registry configuration.
    pub config: Arc<RegistryConfig>,
    /// Client IP to cloud/region classifier.
    pub region_mapper: Arc<TrieMap<IpInfo>>,
    /// Upstream selection tables.
    pub upstreams: Arc<UpstreamSelector>,
    /// Mirror blob existence probe, injectable so tests can fake it.
    pub blobs: Arc<dyn BlobChecker>,
}

impl AppState {
    pub fn new(config: RegistryConfig, blobs: Arc<dyn BlobChecker>) -> Self {
        Self {
            config: Arc::new(config),
            region_mapper: Arc::new(waypost_cloudmap::ip_mapper()),
            upstreams: Arc::new(UpstreamSelector::new()),
            blobs,
        }
    }
}
