//! Cache validity policy for fetched archives.

use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::CoreError;

/// When an archive already present in the cache should be fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Always re-fetch, even if present.
    Always,
    /// Never re-fetch a file already present.
    #[default]
    Never,
    /// Re-fetch only if the cached copy is older than the given age.
    OlderThan(Duration),
}

impl Freshness {
    /// Decide whether `path` must be fetched, given the current time.
    ///
    /// A missing file always needs fetching. An unreadable modification time
    /// counts as stale.
    pub fn needs_fetch(&self, path: &Path, now: SystemTime) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return true;
        };
        match self {
            Freshness::Always => true,
            Freshness::Never => false,
            Freshness::OlderThan(max_age) => match meta.modified() {
                Ok(mtime) => now.duration_since(mtime).unwrap_or_default() >= *max_age,
                Err(_) => true,
            },
        }
    }
}

impl FromStr for Freshness {
    type Err = CoreError;

    /// `always`, `never`, or a maximum age in seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "always" => Ok(Freshness::Always),
            "never" => Ok(Freshness::Never),
            secs => secs
                .parse::<u64>()
                .map(|n| Freshness::OlderThan(Duration::from_secs(n)))
                .map_err(|_| CoreError::InvalidFreshness(s.to_string())),
        }
    }
}
