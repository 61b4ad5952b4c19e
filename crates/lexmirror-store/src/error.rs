use std::path::PathBuf;

use lexmirror_core::{Corpus, Target, Timestamp, format_timestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "missing delivery for {corpus} (target {target}): no gap-free chain in the cache \
         (oldest cached: {}, installed: {}); fetch more archives",
        show(oldest_known),
        show(installed)
    )]
    MissingDelivery {
        corpus: Corpus,
        target: Target,
        oldest_known: Option<Timestamp>,
        installed: Option<Timestamp>,
    },

    #[error(
        "incoherent mirror for {corpus}: {} is present ({operation}); inspect and clean up manually",
        flag.display()
    )]
    IncoherentMirror {
        corpus: Corpus,
        flag: PathBuf,
        operation: String,
    },

    #[error("archive unreadable: {}: {reason} (re-fetch recommended)", path.display())]
    ArchiveUnreadable { path: PathBuf, reason: String },

    #[error("corrupt mirror metadata in {}: {content:?}", path.display())]
    CorruptMetadata { path: PathBuf, content: String },

    #[error("cannot {action} for {corpus}: {reason}")]
    Precondition {
        corpus: Corpus,
        action: &'static str,
        reason: String,
    },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("version control failed: {0}")]
    VersionControl(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Attach the offending path to an I/O error.
pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.into();
    move |source| StoreError::Io { path, source }
}

fn show(ts: &Option<Timestamp>) -> String {
    ts.as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "none".to_string())
}
