//! Request error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Client-visible request failures.
///
/// Everything here maps to a plain-text status response; the redirect path
/// performs no retries (the pulling client retries).
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The listener did not record a peer address for this connection.
    #[error("failed to determine peer address")]
    BadPeerAddress,

    /// `X-Forwarded-For` was present but not in the trusted
    /// `…, <client-ip>, <lb-ip>` shape.
    #[error("invalid X-Forwarded-For value: {0}")]
    BadForwardedHeader(String),
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadPeerAddress | Self::BadForwardedHeader(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
