//! Originating client IP extraction.
//!
//! Only two deployment scenarios are supported: direct connections (local
//! testing) and sitting behind the cloud HTTP load balancer. The load
//! balancer appends `<client-ip>,<load-balancer-ip>` to any inbound
//! `X-Forwarded-For` value and does **not** verify anything the client
//! supplied before those two entries, so only the last two positions are
//! trusted and the client address is always second-to-last.

use crate::error::RequestError;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use std::net::{IpAddr, SocketAddr};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Extract the originating client address for a request.
///
/// Without a forwarding header this is the TCP peer address. With one, the
/// header must contain at least the two load-balancer-appended entries;
/// anything shorter is a misconfigured or spoofed request and is rejected
/// rather than silently accepted.
pub fn client_ip(req: &Request) -> Result<IpAddr, RequestError> {
    let Some(raw) = req.headers().get(X_FORWARDED_FOR) else {
        return req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(peer)| peer.ip())
            .ok_or(RequestError::BadPeerAddress);
    };

    let raw = raw
        .to_str()
        .map_err(|_| RequestError::BadForwardedHeader("not printable ASCII".to_string()))?;

    // entries may be separated by commas or spaces, possibly repeated
    let entries: Vec<&str> = raw
        .split([',', ' '])
        .filter(|entry| !entry.is_empty())
        .collect();
    if entries.len() < 2 {
        return Err(RequestError::BadForwardedHeader(raw.to_string()));
    }

    let client = entries[entries.len() - 2];
    client
        .parse()
        .map_err(|e| RequestError::BadForwardedHeader(format!("{client:?}: {e}")))
}
