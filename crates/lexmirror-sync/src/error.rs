use std::path::PathBuf;

use lexmirror_core::Corpus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote could not be reached at all.
    #[error("fetch unavailable: {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("server returned {status} for {url}: {body}")]
    Server {
        url: String,
        status: u16,
        body: String,
    },

    #[error("remote listing of {corpus} holds {bases} base dumps, expected exactly one")]
    RemoteLayout { corpus: Corpus, bases: usize },

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Connectivity failures, which optional fetching tolerates.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FetchError::Unavailable { .. })
    }
}

pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> FetchError {
    let path = path.into();
    move |source| FetchError::Io { path, source }
}
