//! Waypost redirect server library.
//!
//! `waypostd` fronts an OCI registry behind a single vanity host: it
//! classifies each client's source network and answers with a 307 to the
//! mirror (regional bucket, CDN, or upstream registry) that most cheaply
//! serves the requested bytes. It never proxies blob bytes and never writes
//! to the registry API.

pub mod blobcheck;
pub mod buckets;
pub mod clientip;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod upstreams;

pub use blobcheck::{BlobChecker, CachedBlobChecker};
pub use routes::create_router;
pub use state::AppState;
