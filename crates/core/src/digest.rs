//! Content digests and manifest references.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A content digest in `<algorithm>:<hex>` form, e.g.
/// `sha256:da86e6ba6ca197bf6bc5e9d900febd906b133eaa4750e6bed647b0fbe50ed43e`.
///
/// Only the shape is validated here; whether the digest actually matches the
/// content it names is the registry's concern.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// The digest algorithm, e.g. `sha256`.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The hex-encoded digest value.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Whether this is a SHA-256 digest.
    pub fn is_sha256(&self) -> bool {
        self.algorithm == "sha256"
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidDigest(format!("missing ':' separator in {s:?}")))?;
        if algorithm.is_empty()
            || !algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(Error::InvalidDigest(format!("bad algorithm in {s:?}")));
        }
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidDigest(format!("bad hex in {s:?}")));
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            // normalize so cache keys and object keys compare equal
            hex: hex.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl TryFrom<String> for Digest {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.to_string()
    }
}

/// A digest-pinned reference to a manifest in a repository.
///
/// Canonical stringification is `<repository>@<algorithm>:<hex>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ManifestRef {
    pub repository: String,
    pub digest: Digest,
}

impl ManifestRef {
    pub fn new(repository: impl Into<String>, digest: Digest) -> Self {
        Self {
            repository: repository.into(),
            digest,
        }
    }
}

impl FromStr for ManifestRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (repository, digest) = s
            .split_once('@')
            .ok_or_else(|| Error::InvalidReference(format!("missing '@' in {s:?}")))?;
        if repository.is_empty() {
            return Err(Error::InvalidReference(format!("empty repository in {s:?}")));
        }
        Ok(Self {
            repository: repository.to_string(),
            digest: digest.parse()?,
        })
    }
}

impl fmt::Display for ManifestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAUSE_DIGEST: &str =
        "sha256:da86e6ba6ca197bf6bc5e9d900febd906b133eaa4750e6bed647b0fbe50ed43e";

    #[test]
    fn digest_round_trips() {
        let d: Digest = PAUSE_DIGEST.parse().unwrap();
        assert_eq!(d.algorithm(), "sha256");
        assert!(d.is_sha256());
        assert_eq!(d.to_string(), PAUSE_DIGEST);
    }

    #[test]
    fn digest_normalizes_hex_case() {
        let d: Digest = "sha256:ABCDEF0123".parse().unwrap();
        assert_eq!(d.hex(), "abcdef0123");
    }

    #[test]
    fn digest_rejects_malformed() {
        for bad in [
            "",
            "sha256",
            ":abcd",
            "sha256:",
            "sha256:xyz!",
            "SHA256:abcd",
            "sha 256:abcd",
        ] {
            assert!(bad.parse::<Digest>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn manifest_ref_round_trips() {
        let raw = format!("registry.example.com/pause@{PAUSE_DIGEST}");
        let r: ManifestRef = raw.parse().unwrap();
        assert_eq!(r.repository, "registry.example.com/pause");
        assert_eq!(r.to_string(), raw);
    }

    #[test]
    fn manifest_ref_rejects_tag_references() {
        assert!("pause:latest".parse::<ManifestRef>().is_err());
        assert!(format!("@{PAUSE_DIGEST}").parse::<ManifestRef>().is_err());
    }

    #[test]
    fn digest_serde_uses_canonical_string() {
        let d: Digest = PAUSE_DIGEST.parse().unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{PAUSE_DIGEST}\""));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
