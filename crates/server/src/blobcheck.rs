//! Blob existence probing with a TTL-bounded memo cache.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Default lifetime of a cached answer, positive or negative.
const BLOB_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Ceiling on a single HEAD probe against a mirror.
const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Answers "does this URL exist", possibly with caching.
///
/// A single-method capability so the probe can be faked in handler tests.
#[async_trait]
pub trait BlobChecker: Send + Sync {
    /// True iff a HEAD on `url` returned 200 OK, now or recently.
    async fn blob_exists(&self, url: &str) -> bool;
}

#[derive(Clone, Copy)]
struct CacheEntry {
    exists: bool,
    expires_at: Instant,
}

/// HEAD-probing checker with an in-memory memo per blob URL.
///
/// Both positive and negative answers are cached; entries are evicted lazily
/// when read after expiry. The map is unbounded: the process is a short-lived
/// serverless instance and idle instances are reaped, so the win of a bound
/// does not pay for its bookkeeping here. A long-lived deployment must cap
/// this (an LRU around 10^5 entries) before reusing it.
///
/// Two concurrent misses for the same URL may both probe; HEAD against
/// object storage is cheap enough that suppressing the stampede costs more
/// than it saves.
pub struct CachedBlobChecker {
    client: reqwest::Client,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl CachedBlobChecker {
    pub fn new() -> Self {
        Self::with_ttl(BLOB_CACHE_TTL)
    }

    /// Checker with a custom TTL (tests exercise expiry with short ones).
    pub fn with_ttl(ttl: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HEAD_TIMEOUT)
            .build()
            // the builder only fails on TLS backend misconfiguration, which
            // is a build problem, not a runtime one
            .expect("failed to build HTTP client");
        Self {
            client,
            cache: DashMap::new(),
            ttl,
        }
    }

    async fn head(&self, url: &str) -> bool {
        let started = Instant::now();
        match self.client.head(url).send().await {
            // a blob that exists answers HEAD with exactly 200 OK, on S3 and
            // on OCI registries alike; anything else is "not here"
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::debug!(url, elapsed = ?started.elapsed(), "blob exists");
                true
            }
            Ok(response) => {
                tracing::debug!(
                    url,
                    status = %response.status(),
                    elapsed = ?started.elapsed(),
                    "blob does not exist"
                );
                false
            }
            // fall back to assuming the blob is unavailable; the caller
            // redirects to an upstream that certainly has it
            Err(error) => {
                tracing::warn!(url, %error, elapsed = ?started.elapsed(), "blob HEAD failed");
                false
            }
        }
    }
}

impl Default for CachedBlobChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobChecker for CachedBlobChecker {
    async fn blob_exists(&self, url: &str) -> bool {
        let cached = self.cache.get(url).map(|entry| *entry);
        match cached {
            Some(entry) if entry.expires_at > Instant::now() => {
                tracing::trace!(url, exists = entry.exists, "blob cache hit");
                return entry.exists;
            }
            Some(_) => {
                // expired; evict before re-probing
                self.cache.remove(url);
            }
            None => {}
        }

        tracing::trace!(url, "blob cache miss");
        let exists = self.head(url).await;
        self.cache.insert(
            url.to_string(),
            CacheEntry {
                exists,
                expires_at: Instant::now() + self.ttl,
            },
        );
        exists
    }
}
