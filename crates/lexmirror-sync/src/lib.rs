//! Fetch collaborator: list the publisher's archives and fill the local cache.
//!
//! The store only cares that archives are present in the cache. This crate
//! decides which remote archives a target needs, downloads them with bounded
//! parallelism, and tells connectivity failures apart so that a sync can fall
//! back to the cache alone.

mod error;
pub use error::FetchError;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::HttpFetcher;

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use lexmirror_core::{Corpus, CorpusTable, Delivery, Freshness, Target, Timestamp};
use tracing::{debug, info, warn};

use crate::error::io_at;

/// Downloads in flight per corpus.
pub const PARALLEL_DOWNLOADS: usize = 4;

/// One archive offered by the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArchive {
    pub delivery: Delivery,
    pub url: String,
    /// Name on the remote side, which differs from the cache name.
    pub file_name: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Every archive currently published for `corpus`.
    async fn list(&self, corpus: Corpus) -> Result<Vec<RemoteArchive>, FetchError>;

    /// Store `remote` at `local` unless `freshness` says the cached copy is
    /// still valid. Returns whether a transfer happened.
    async fn fetch(
        &self,
        remote: &RemoteArchive,
        local: &Path,
        freshness: Freshness,
    ) -> Result<bool, FetchError>;
}

/// How `sync` treats the fetch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Any fetch failure aborts the sync.
    Required,
    /// Connectivity failures are logged and the sync runs on the cache.
    #[default]
    Optional,
    /// Use the cache as it is.
    Skip,
}

/// What a download pass did for one corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub corpus: Corpus,
    /// Archives published remotely.
    pub listed: usize,
    /// Archives transferred, ascending.
    pub downloaded: Vec<Delivery>,
    /// Archives in the window whose cached copy was kept.
    pub fresh: usize,
}

/// Download every archive `target` selects from the remote listing.
///
/// The listing must hold exactly one base dump; patches published before it
/// can never be applied and are not fetched.
pub async fn download_target(
    fetcher: &dyn Fetcher,
    table: &CorpusTable,
    cache_dir: &Path,
    corpus: Corpus,
    target: Target,
    freshness: Freshness,
) -> Result<FetchReport, FetchError> {
    let mut remote = fetcher.list(corpus).await?;
    remote.sort_by_key(|r| r.delivery);
    remote.dedup_by_key(|r| r.delivery);
    let listed = remote.len();

    let bases: Vec<Timestamp> = remote
        .iter()
        .filter(|r| r.delivery.is_base())
        .map(|r| r.delivery.timestamp)
        .collect();
    let [base_at] = bases[..] else {
        return Err(FetchError::RemoteLayout {
            corpus,
            bases: bases.len(),
        });
    };

    let deliveries: Vec<Delivery> = remote.iter().map(|r| r.delivery).collect();
    let window = target.window(&deliveries);
    let wanted: Vec<RemoteArchive> = remote
        .into_iter()
        .filter(|r| window.contains(&r.delivery))
        .filter(|r| {
            let usable = r.delivery.timestamp >= base_at;
            if !usable {
                debug!(corpus = %corpus, delivery = %r.delivery, "skipping patch older than the base dump");
            }
            usable
        })
        .collect();

    tokio::fs::create_dir_all(cache_dir)
        .await
        .map_err(io_at(cache_dir))?;
    let config = table.get(corpus);
    let results: Vec<(Delivery, bool)> = stream::iter(&wanted)
        .map(|remote| {
            let local = cache_dir.join(config.local_name(corpus, &remote.delivery));
            async move {
                let fetched = fetcher.fetch(remote, &local, freshness).await?;
                Ok::<_, FetchError>((remote.delivery, fetched))
            }
        })
        .buffer_unordered(PARALLEL_DOWNLOADS)
        .try_collect()
        .await?;

    let mut downloaded: Vec<Delivery> = results
        .iter()
        .filter(|(_, fetched)| *fetched)
        .map(|(d, _)| *d)
        .collect();
    downloaded.sort();
    let fresh = results.len() - downloaded.len();
    info!(
        corpus = %corpus,
        %target,
        listed,
        downloaded = downloaded.len(),
        fresh,
        "cache refreshed"
    );
    Ok(FetchReport {
        corpus,
        listed,
        downloaded,
        fresh,
    })
}

/// Run the fetch step of a sync according to `mode`.
///
/// Returns `None` when nothing was fetched: the mode was `Skip`, or the
/// remote was unreachable in `Optional` mode.
pub async fn refresh_cache(
    fetcher: &dyn Fetcher,
    table: &CorpusTable,
    cache_dir: &Path,
    corpus: Corpus,
    target: Target,
    freshness: Freshness,
    mode: FetchMode,
) -> Result<Option<FetchReport>, FetchError> {
    match mode {
        FetchMode::Skip => {
            debug!(corpus = %corpus, "fetch skipped");
            Ok(None)
        }
        FetchMode::Required => {
            download_target(fetcher, table, cache_dir, corpus, target, freshness)
                .await
                .map(Some)
        }
        FetchMode::Optional => {
            match download_target(fetcher, table, cache_dir, corpus, target, freshness).await {
                Ok(report) => Ok(Some(report)),
                Err(e) if e.is_unavailable() => {
                    warn!(corpus = %corpus, error = %e, "remote unavailable; using cached archives");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }
    }
}
