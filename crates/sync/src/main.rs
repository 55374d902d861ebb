//! Waypost sync binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypost_storage::{ObjectStore, S3Backend};
use waypost_sync::transport::DEFAULT_REGISTRY_RPS;
use waypost_sync::walker::DEFAULT_CONCURRENT_VISITS;
use waypost_sync::{ImageUploader, RateLimitedClient, RegistryClient, Repository, Walker};

/// Replicate image layer blobs from a source registry into a mirror bucket.
#[derive(Parser, Debug)]
#[command(name = "waypost-sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Source repository to replicate, as <registry-host>/<repository>
    #[arg(
        long,
        env = "SOURCE_REPOSITORY",
        default_value = "us-central1-docker.pkg.dev/waypost-prod/images"
    )]
    source: String,

    /// Destination S3 bucket
    #[arg(long, env = "DEST_BUCKET", default_value = "prod-waypost-us-east-2")]
    bucket: String,

    /// Region of the destination bucket
    #[arg(long, env = "DEST_REGION", default_value = "us-east-2")]
    region: String,

    /// Registry reads per second, shared across the whole process
    #[arg(long, default_value_t = DEFAULT_REGISTRY_RPS)]
    rps: NonZeroU32,

    /// Maximum concurrent image visits (capped at 1000)
    #[arg(long, default_value_t = DEFAULT_CONCURRENT_VISITS)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // uploads are opt-in; an empty or missing REALLY_UPLOAD forces dry-run
    let dry_run = std::env::var("REALLY_UPLOAD")
        .map(|v| v.is_empty())
        .unwrap_or(true);
    if dry_run {
        tracing::info!("REALLY_UPLOAD is not set; running dry (no writes)");
    }

    let source: Repository = args
        .source
        .parse()
        .with_context(|| format!("invalid source repository {:?}", args.source))?;

    let store: Arc<dyn ObjectStore> = if dry_run {
        // anonymous credentials: even a bug cannot mutate the bucket
        Arc::new(S3Backend::new_anonymous(&args.bucket, &args.region).await)
    } else {
        Arc::new(S3Backend::new(&args.bucket, &args.region).await)
    };

    let transport = Arc::new(RateLimitedClient::new(args.rps));
    let registry = Arc::new(RegistryClient::new(transport));
    let uploader = Arc::new(ImageUploader::new(store, registry.clone(), dry_run));

    tracing::info!(
        source = %source,
        bucket = %args.bucket,
        rps = %args.rps,
        concurrency = args.concurrency,
        dry_run,
        "starting walk"
    );

    let walker = Walker::new(registry, args.concurrency);
    walker
        .walk(source, uploader)
        .await
        .context("replication walk failed")?;

    tracing::info!("done");
    Ok(())
}
