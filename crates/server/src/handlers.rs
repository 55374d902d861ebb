//! The redirect policy: every request becomes a 307 to the cheapest mirror,
//! a small direct response, or an error status.

use crate::buckets::aws_region_to_host_url;
use crate::clientip::client_ip;
use crate::metrics;
use crate::state::AppState;
use crate::upstreams::upstream_redirect_url;
use axum::extract::{Request, State};
use axum::http::header::LOCATION;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use waypost_cloudmap::{Cloud, IpInfo};

const API_VERSION_HEADER: &str = "Docker-Distribution-Api-Version";
const API_VERSION: &str = "registry/2.0";

/// Root handler; the whole surface hangs off the router's fallback route.
pub async fn handle(State(state): State<AppState>, req: Request) -> Response {
    metrics::ACTIVE_REQUESTS.inc();
    let method = req.method().clone();

    // classify once; the policy and the metric labels both want it, and a
    // failed extraction only matters on paths that need the address
    let client = client_ip(&req);
    let ip_info: Option<IpInfo> = client
        .as_ref()
        .ok()
        .and_then(|&ip| state.region_mapper.get_ip(ip).copied());

    let response = route(&state, &method, req.uri().path(), client.is_err(), ip_info).await;

    let response = match response {
        Ok(response) => response,
        // surface the extraction failure the policy deferred to us
        Err(()) => match client {
            Err(error) => {
                tracing::warn!(%error, "failed to get client IP");
                error.into_response()
            }
            // unreachable: route only errors when extraction failed
            Ok(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        },
    };

    metrics::ACTIVE_REQUESTS.dec();
    metrics::REQUESTS
        .with_label_values(&[
            response.status().as_str(),
            method.as_str(),
            ip_info.map(|i| i.cloud.as_str()).unwrap_or(""),
            ip_info.map(|i| i.region).unwrap_or(""),
        ])
        .inc();
    response
}

/// Dispatch a request. `Err(())` means "answer with the client-IP
/// extraction error"; only `/v2` paths care about the address.
async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    client_ip_failed: bool,
    ip_info: Option<IpInfo>,
) -> Result<Response, ()> {
    // pulling images needs only GET and HEAD; mutation is not supported
    if method != Method::GET && method != Method::HEAD {
        return Ok((
            StatusCode::METHOD_NOT_ALLOWED,
            "Only GET and HEAD are allowed.",
        )
            .into_response());
    }

    if path.starts_with("/v2") {
        return handle_v2(state, path, client_ip_failed, ip_info).await;
    }
    Ok(match path {
        "/" => temporary_redirect(&state.config.info_url),
        _ if path.starts_with("/privacy") => temporary_redirect(&state.config.privacy_url),
        _ => {
            tracing::debug!(path, "unknown request");
            StatusCode::NOT_FOUND.into_response()
        }
    })
}

async fn handle_v2(
    state: &AppState,
    path: &str,
    client_ip_failed: bool,
    ip_info: Option<IpInfo>,
) -> Result<Response, ()> {
    // every /v2 decision is keyed on the classified client address
    if client_ip_failed {
        return Err(());
    }
    let rc = &state.config;

    // API version probe. Clients give up on token acquisition when this
    // returns 200, which suits upstreams that serve public pulls without a
    // token; Azure's registry does demand one, so Azure clients get the
    // probe forwarded to it instead.
    if path == "/v2" || path == "/v2/" {
        if matches!(ip_info, Some(info) if info.cloud == Cloud::Azure) {
            let location =
                upstream_redirect_url(state.upstreams.select(rc, ip_info, &rc.upstream_azure), path);
            tracing::debug!(%location, "forwarding API probe to Azure upstream");
            return Ok(temporary_redirect(&location));
        }
        tracing::debug!(path, "serving 200 OK for /v2/ check");
        return Ok((
            StatusCode::OK,
            [(API_VERSION_HEADER, API_VERSION)],
        )
            .into_response());
    }

    // the non-standard catalog API is deliberately unsupported
    if path == "/v2/_catalog" {
        return Ok((StatusCode::NOT_FOUND, "_catalog is not supported").into_response());
    }

    // anything that isn't a blob or manifest pull goes to the main upstream
    if !is_blob_or_manifest_path(path) {
        let location =
            upstream_redirect_url(state.upstreams.select(rc, ip_info, &rc.upstream_us), path);
        tracing::debug!(path, %location, "redirecting non-pull request upstream");
        return Ok(temporary_redirect(&location));
    }

    // blob or manifest pull from outside AWS: stay in the client's cloud
    // where we have a registry there, otherwise serve from the CDN
    if !matches!(ip_info, Some(info) if info.cloud == Cloud::Aws) {
        let location =
            upstream_redirect_url(state.upstreams.select(rc, ip_info, &rc.upstream_cdn), path);
        tracing::debug!(path, %location, "redirecting pull request upstream");
        return Ok(temporary_redirect(&location));
    }

    // AWS client: probe the regional mirror bucket first
    let region = ip_info.map(|info| info.region).unwrap_or_default();
    let bucket_url = aws_region_to_host_url(region, &rc.upstream_cdn.endpoint);
    let blob_url = format!("{}{}", bucket_url.trim_end_matches('/'), path);

    if state.blobs.blob_exists(&blob_url).await {
        metrics::BLOB_PROBES.with_label_values(&["exists"]).inc();
        tracing::debug!(path, %blob_url, "redirecting blob request to regional mirror");
        return Ok(temporary_redirect(&blob_url));
    }
    metrics::BLOB_PROBES.with_label_values(&["absent"]).inc();

    let location = upstream_redirect_url(&rc.upstream_cdn, path);
    tracing::debug!(path, %location, "mirror miss; redirecting pull request to CDN");
    Ok(temporary_redirect(&location))
}

/// Matches the OCI pull shape `^/v2/.*/(blobs|manifests)/.*$`.
fn is_blob_or_manifest_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix("/v2/") else {
        return false;
    };
    rest.contains("/blobs/") || rest.contains("/manifests/")
}

fn temporary_redirect(location: &str) -> Response {
    (
        StatusCode::TEMPORARY_REDIRECT,
        [(LOCATION, location.to_string())],
    )
        .into_response()
}
