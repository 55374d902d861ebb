//! Walks every manifest in a repository tree and visits its layers.

use crate::error::SyncError;
use crate::layers;
use crate::registry::{RegistryClient, Repository};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use waypost_core::{Digest, ManifestRef};

/// Hard ceiling on concurrent visits, whatever the configuration says.
pub const MAX_CONCURRENT_VISITS: usize = 1000;

/// Default concurrent visits; an approximation to stay well inside typical
/// socket limits while the rate limiter is the real throughput governor.
pub const DEFAULT_CONCURRENT_VISITS: usize = 10;

/// What the walker calls for each enumerated image.
#[async_trait]
pub trait ImageVisitor: Send + Sync + 'static {
    /// Cheap pre-check; a true answer skips the image before its manifest
    /// is even fetched.
    async fn already_done(&self, manifest_digest: &Digest) -> bool;

    /// Process one image and its ordered layer digests.
    async fn visit(&self, reference: ManifestRef, layer_digests: Vec<Digest>)
    -> Result<(), SyncError>;
}

/// Bounded-concurrency registry walker.
///
/// Enumeration relies on the extended `tags/list` endpoint of GCP-hosted
/// registries, which reports every manifest digest (tagged or not) plus
/// child repositories; index manifests are skipped because the listing
/// already includes the per-architecture children. The first visit error
/// cancels the outstanding visits and is returned.
pub struct Walker {
    client: Arc<RegistryClient>,
    concurrency: usize,
}

impl Walker {
    pub fn new(client: Arc<RegistryClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.clamp(1, MAX_CONCURRENT_VISITS),
        }
    }

    /// Walk `root` and all child repositories, dispatching one visit per
    /// non-index manifest.
    pub async fn walk(
        &self,
        root: Repository,
        visitor: Arc<dyn ImageVisitor>,
    ) -> Result<(), SyncError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let cancel = CancellationToken::new();
        let mut tasks: JoinSet<Result<(), SyncError>> = JoinSet::new();
        let mut first_error: Option<SyncError> = None;

        let mut pending = VecDeque::from([root]);
        'listing: while let Some(repo) = pending.pop_front() {
            // listing failures abort the walk outright
            let listing = match self.client.list_tags(&repo).await {
                Ok(listing) => listing,
                Err(error) => {
                    record_error(&mut first_error, &cancel, error);
                    break 'listing;
                }
            };
            for child in &listing.child {
                pending.push_back(repo.child(child));
            }

            for (digest, summary) in listing.manifest {
                // the listing already walks child manifests of these
                if layers::is_index(&summary.media_type) {
                    continue;
                }
                let digest: Digest = match digest.parse() {
                    Ok(digest) => digest,
                    Err(error) => {
                        record_error(&mut first_error, &cancel, error.into());
                        break 'listing;
                    }
                };

                let client = self.client.clone();
                let visitor = visitor.clone();
                let semaphore = semaphore.clone();
                let task_cancel = cancel.clone();
                let repo = repo.clone();
                tasks.spawn(async move {
                    // closed only when the walk is being torn down
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return Ok(());
                    };
                    tokio::select! {
                        _ = task_cancel.cancelled() => Ok(()),
                        result = visit_manifest(client, visitor, repo, digest) => result,
                    }
                });

                // surface failures early instead of enumerating the whole
                // registry after the walk is already doomed
                while let Some(finished) = tasks.try_join_next() {
                    if observe(&mut first_error, &cancel, finished) {
                        break 'listing;
                    }
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            observe(&mut first_error, &cancel, finished);
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Fetch one manifest and hand its layers to the visitor.
async fn visit_manifest(
    client: Arc<RegistryClient>,
    visitor: Arc<dyn ImageVisitor>,
    repo: Repository,
    digest: Digest,
) -> Result<(), SyncError> {
    if visitor.already_done(&digest).await {
        tracing::debug!(%repo, %digest, "image already replicated, skipping");
        return Ok(());
    }

    let (raw, media_type) = client.manifest(&repo, &digest).await?;
    let reference = ManifestRef::new(repo.to_string(), digest);

    // should not happen: the enumeration skips these upfront
    if layers::is_index(&media_type) {
        tracing::warn!(%reference, "skipping index manifest");
        return Ok(());
    }

    match layers::layers_for_manifest(&media_type, &raw) {
        Ok(layer_digests) => visitor.visit(reference, layer_digests).await,
        Err(SyncError::UnhandledMediaType(mt)) => {
            tracing::warn!(%reference, media_type = %mt, "skipping unhandled media type");
            Ok(())
        }
        Err(error) => Err(error),
    }
}

fn record_error(first_error: &mut Option<SyncError>, cancel: &CancellationToken, error: SyncError) {
    tracing::error!(%error, "walk failed");
    if first_error.is_none() {
        *first_error = Some(error);
    }
    cancel.cancel();
}

/// Fold one joined task into the error state; true if the walk should stop.
fn observe(
    first_error: &mut Option<SyncError>,
    cancel: &CancellationToken,
    finished: Result<Result<(), SyncError>, tokio::task::JoinError>,
) -> bool {
    match finished {
        Ok(Ok(())) => false,
        Ok(Err(error)) => {
            record_error(first_error, cancel, error);
            true
        }
        Err(join_error) => {
            record_error(first_error, cancel, SyncError::Task(join_error.to_string()));
            true
        }
    }
}
