//! Naive linear-scan prefix matcher.
//!
//! This exists purely as the reference implementation for testing and
//! benchmarking the trie; it is two-plus orders of magnitude slower on the
//! full table.

use crate::trie::Prefix;
use std::net::IpAddr;

/// Linear-scan longest-prefix matcher over an explicit prefix list.
pub struct BruteForceMapper<V> {
    mapping: Vec<(Prefix, V)>,
}

impl<V> BruteForceMapper<V> {
    pub fn new(mapping: Vec<(Prefix, V)>) -> Self {
        Self { mapping }
    }

    /// Scan every prefix and return the value of the longest one containing
    /// `ip`, if any.
    pub fn get_ip(&self, ip: IpAddr) -> Option<&V> {
        let ip = ip.to_canonical();
        self.mapping
            .iter()
            .filter(|(prefix, _)| prefix.contains(ip))
            .max_by_key(|(prefix, _)| prefix.bits())
            .map(|(_, value)| value)
    }
}
