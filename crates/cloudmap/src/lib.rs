//! Cloud provider IP classification.
//!
//! Maps a client IP address to the cloud provider and region that announced
//! it, using tables compiled in from the vendors' published range data and a
//! binary prefix trie for sub-microsecond longest-prefix lookups.
//!
//! ```
//! use waypost_cloudmap::{Cloud, ip_mapper};
//!
//! let mapper = ip_mapper();
//! if let Some(info) = mapper.get_ip("35.180.1.1".parse().unwrap()) {
//!     assert_eq!(info.cloud, Cloud::Aws);
//!     assert_eq!(info.region, "eu-west-3");
//! }
//! ```

pub mod bruteforce;
mod data;
pub mod trie;

pub use trie::{Prefix, TrieMap};

use std::fmt;

/// A cloud provider we hold mirror resources in or route specially for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cloud {
    Aws,
    Gcp,
    Azure,
}

impl Cloud {
    /// Short vendor tag, as used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Cloud::Aws => "AWS",
            Cloud::Gcp => "GCP",
            Cloud::Azure => "AZ",
        }
    }
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classification result: which cloud, which region.
///
/// `region` is the vendor's canonical region name (`us-east-1`,
/// `europe-west1`, `westeurope`, ...). Values are compiled in, so the string
/// is static and the whole struct is cheap to copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IpInfo {
    pub cloud: Cloud,
    pub region: &'static str,
}

/// Build the classifier trie from the compiled tables.
///
/// Build this once at startup and share it; lookups need no locking.
pub fn ip_mapper() -> TrieMap<IpInfo> {
    let mut map = TrieMap::new();
    for (prefix, info) in all_ranges() {
        map.insert(prefix, info);
    }
    map
}

/// Every `IpInfo` value a mapper built from the compiled tables can return.
pub fn all_ip_infos() -> Vec<IpInfo> {
    data::REGION_RANGES
        .iter()
        .map(|r| IpInfo {
            cloud: r.cloud,
            region: r.region,
        })
        .collect()
}

/// Every `(prefix, info)` pair in the compiled tables.
pub fn all_ranges() -> impl Iterator<Item = (Prefix, IpInfo)> {
    data::REGION_RANGES.iter().flat_map(|r| {
        let info = IpInfo {
            cloud: r.cloud,
            region: r.region,
        };
        let v4 = r.v4.iter().map(move |&(octets, bits)| (Prefix::v4(octets, bits), info));
        let v6 = r
            .v6
            .iter()
            .map(move |&(segments, bits)| (Prefix::v6(segments, bits), info));
        v4.chain(v6)
    })
}
