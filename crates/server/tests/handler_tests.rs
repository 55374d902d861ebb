//! End-to-end tests for the redirect policy over the HTTP surface.

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use waypost_core::RegistryConfig;
use waypost_server::{AppState, BlobChecker, create_router};

const PAUSE_BLOB: &str =
    "/v2/pause/blobs/sha256:da86e6ba6ca197bf6bc5e9d900febd906b133eaa4750e6bed647b0fbe50ed43e";
const MISSING_BLOB: &str =
    "/v2/pause/blobs/sha256:aaaa567812345678123456781234567812345678123456781234567812344567";

const EU_WEST_3_BUCKET: &str =
    "https://prod-waypost-eu-west-3.s3.dualstack.eu-west-3.amazonaws.com";

// peers taken from the compiled range tables
const AWS_EU_WEST_3_PEER: &str = "35.180.1.1:4242";
const GCP_US_CENTRAL1_PEER: &str = "8.34.210.1:4242";
const AZURE_EASTUS_PEER: &str = "20.38.98.10:4242";
const UNKNOWN_PEER: &str = "192.0.2.5:4242";

/// Checker that knows a fixed set of URLs and records every probe.
struct FakeBlobChecker {
    known_urls: HashSet<String>,
    probes: std::sync::Mutex<Vec<String>>,
}

impl FakeBlobChecker {
    fn new<const N: usize>(known: [String; N]) -> Self {
        Self {
            known_urls: known.into_iter().collect(),
            probes: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl BlobChecker for FakeBlobChecker {
    async fn blob_exists(&self, url: &str) -> bool {
        self.probes.lock().unwrap().push(url.to_string());
        self.known_urls.contains(url)
    }
}

fn test_router() -> (Router, Arc<FakeBlobChecker>) {
    let blobs = Arc::new(FakeBlobChecker::new([format!(
        "{EU_WEST_3_BUCKET}{PAUSE_BLOB}"
    )]));
    let state = AppState::new(RegistryConfig::for_testing(), blobs.clone());
    (create_router(state, false), blobs)
}

fn request(method: &str, path: &str, peer: &str, xff: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(value) = xff {
        builder = builder.header("X-Forwarded-For", value);
    }
    let mut req = builder.body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    req
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, location, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn aws_blob_in_regional_bucket_redirects_to_bucket() {
    let (router, blobs) = test_router();
    let (status, location, _) =
        send(&router, request("GET", PAUSE_BLOB, AWS_EU_WEST_3_PEER, None)).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location.unwrap(), format!("{EU_WEST_3_BUCKET}{PAUSE_BLOB}"));
    assert_eq!(
        blobs.probes.lock().unwrap().clone(),
        vec![format!("{EU_WEST_3_BUCKET}{PAUSE_BLOB}")]
    );
}

#[tokio::test]
async fn gcp_blob_redirects_to_us_upstream() {
    let (router, blobs) = test_router();
    let (status, location, _) = send(
        &router,
        request("GET", PAUSE_BLOB, GCP_US_CENTRAL1_PEER, None),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location.unwrap(),
        format!(
            "https://us-docker.pkg.dev/v2/waypost-test/images{}",
            PAUSE_BLOB.strip_prefix("/v2").unwrap()
        )
    );
    // no bucket probe for non-AWS clients
    assert!(blobs.probes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn aws_missing_blob_falls_back_to_cdn() {
    let (router, _) = test_router();
    let (status, location, _) = send(
        &router,
        request("GET", MISSING_BLOB, AWS_EU_WEST_3_PEER, None),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location.unwrap(),
        format!(
            "https://cdn.test.waypost.dev/v2{}",
            MISSING_BLOB.strip_prefix("/v2").unwrap()
        )
    );
}

#[tokio::test]
async fn aws_manifest_request_goes_to_cdn() {
    let (router, _) = test_router();
    let (status, location, _) = send(
        &router,
        request("GET", "/v2/pause/manifests/latest", AWS_EU_WEST_3_PEER, None),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location.unwrap(),
        "https://cdn.test.waypost.dev/v2/pause/manifests/latest"
    );
}

#[tokio::test]
async fn catalog_is_not_supported() {
    let (router, _) = test_router();
    let (status, _, body) = send(
        &router,
        request("GET", "/v2/_catalog", UNKNOWN_PEER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("_catalog"));
}

#[tokio::test]
async fn mutating_methods_are_rejected() {
    let (router, _) = test_router();
    for method in ["POST", "PUT", "DELETE", "PATCH"] {
        let (status, _, body) = send(&router, request(method, "/v2/", UNKNOWN_PEER, None)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(body, "Only GET and HEAD are allowed.", "{method}");
    }
}

#[tokio::test]
async fn v2_probe_from_azure_forwards_to_azure_upstream() {
    let (router, _) = test_router();
    let (status, location, _) =
        send(&router, request("GET", "/v2/", AZURE_EASTUS_PEER, None)).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location.unwrap(), "https://wayposttest.azurecr.io/v2/");
}

#[tokio::test]
async fn v2_probe_serves_200_with_api_version_header() {
    let (router, _) = test_router();
    for (method, path, peer) in [
        ("GET", "/v2/", UNKNOWN_PEER),
        ("GET", "/v2", UNKNOWN_PEER),
        ("HEAD", "/v2", UNKNOWN_PEER),
        ("GET", "/v2/", AWS_EU_WEST_3_PEER),
        ("GET", "/v2/", GCP_US_CENTRAL1_PEER),
    ] {
        let response = router
            .clone()
            .oneshot(request(method, path, peer, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{method} {path} {peer}");
        assert_eq!(
            response
                .headers()
                .get("Docker-Distribution-Api-Version")
                .unwrap(),
            "registry/2.0"
        );
    }
}

#[tokio::test]
async fn root_redirects_to_info_url() {
    let (router, _) = test_router();
    for method in ["GET", "HEAD"] {
        let (status, location, _) = send(&router, request(method, "/", UNKNOWN_PEER, None)).await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location.unwrap(), "https://waypost.dev/");
    }
}

#[tokio::test]
async fn privacy_redirects_to_privacy_url() {
    let (router, _) = test_router();
    for path in ["/privacy", "/privacy/policy"] {
        let (status, location, _) = send(&router, request("GET", path, UNKNOWN_PEER, None)).await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location.unwrap(), "https://waypost.dev/privacy/");
    }
}

#[tokio::test]
async fn unknown_paths_are_404() {
    let (router, _) = test_router();
    for path in ["/v3/", "/index.html", "/v1/repositories"] {
        let (status, _, _) = send(&router, request("GET", path, UNKNOWN_PEER, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn forwarded_header_classifies_the_client() {
    let (router, _) = test_router();
    // peer is the load balancer; the client entry says AWS eu-west-3
    let (status, location, _) = send(
        &router,
        request("GET", PAUSE_BLOB, UNKNOWN_PEER, Some("35.180.1.1,10.0.0.1")),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location.unwrap(), format!("{EU_WEST_3_BUCKET}{PAUSE_BLOB}"));
}

#[tokio::test]
async fn garbage_forwarded_header_is_400_with_parse_error() {
    let (router, _) = test_router();
    let (status, _, body) = send(
        &router,
        request(
            "GET",
            PAUSE_BLOB,
            UNKNOWN_PEER,
            Some("35.180.1.1garbage,10.0.0.1"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("35.180.1.1garbage"), "{body}");
}

#[tokio::test]
async fn non_pull_v2_paths_forward_to_us_upstream_with_namespace() {
    let (router, _) = test_router();
    let (status, location, _) = send(
        &router,
        request("GET", "/v2/pause/tags/list", UNKNOWN_PEER, None),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location.unwrap(),
        "https://us-docker.pkg.dev/v2/waypost-test/images/pause/tags/list"
    );
}

#[tokio::test]
async fn unknown_client_blob_pull_goes_to_cdn() {
    let (router, blobs) = test_router();
    let (status, location, _) = send(&router, request("GET", PAUSE_BLOB, UNKNOWN_PEER, None)).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location.unwrap(),
        format!(
            "https://cdn.test.waypost.dev/v2{}",
            PAUSE_BLOB.strip_prefix("/v2").unwrap()
        )
    );
    assert!(blobs.probes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn percent_encoded_digest_colon_is_preserved() {
    let (router, blobs) = test_router();
    let encoded = "/v2/pause/blobs/sha256%3Ada86e6ba6ca197bf6bc5e9d900febd906b133eaa4750e6bed647b0fbe50ed43e";
    let (status, location, _) =
        send(&router, request("GET", encoded, AWS_EU_WEST_3_PEER, None)).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    // the mirror probe and the fallback URL must carry the encoding through
    let probed = blobs.probes.lock().unwrap().first().cloned().unwrap();
    assert!(probed.ends_with("sha256%3Ada86e6ba6ca197bf6bc5e9d900febd906b133eaa4750e6bed647b0fbe50ed43e"));
    assert!(
        location
            .unwrap()
            .contains("sha256%3Ada86e6ba6ca197bf6bc5e9d900febd906b133eaa4750e6bed647b0fbe50ed43e")
    );
}
