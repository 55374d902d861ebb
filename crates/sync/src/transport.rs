//! Rate-limited outbound HTTP to the source registry.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Default registry reads per second. 80/s is 4800 requests per minute,
/// safely under the registry's 5000 RPM per-user quota even with other
/// callers on the same credentials.
pub const DEFAULT_REGISTRY_RPS: NonZeroU32 = NonZeroU32::new(80).unwrap();

/// HTTP client that acquires a token from a process-wide bucket before
/// every round-trip.
///
/// The limit is a property of the source registry, not of any one caller,
/// so one instance is shared by everything that talks to it. Burst is one:
/// requests are spread evenly instead of front-loading each second. A
/// waiter that is dropped (request cancelled) simply never dispatches.
pub struct RateLimitedClient {
    http: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
}

impl RateLimitedClient {
    pub fn new(rps: NonZeroU32) -> Self {
        let quota = Quota::per_second(rps).allow_burst(NonZeroU32::MIN);
        Self {
            http: reqwest::Client::new(),
            limiter: RateLimiter::direct(quota),
        }
    }

    /// GET `url` once a rate token is available.
    pub async fn get(&self, url: &str) -> reqwest::Result<reqwest::Response> {
        self.limiter.until_ready().await;
        self.http.get(url).send().await
    }

    /// GET `url` with an `Accept` header once a rate token is available.
    pub async fn get_with_accept(
        &self,
        url: &str,
        accept: &str,
    ) -> reqwest::Result<reqwest::Response> {
        self.limiter.until_ready().await;
        self.http
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
    }
}
