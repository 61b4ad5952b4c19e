//! Cache resolver: which cached archives form a usable chain.
//!
//! The cache is a flat directory of archives named after the corpus's local
//! base and patch templates. Anything else in the directory is ignored.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lexmirror_core::{Corpus, CorpusConfig, Delivery, Target, Timestamp};
use tracing::debug;

use crate::StoreError;
use crate::error::io_at;

/// Outcome of resolving a target against the cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Every cached delivery inside the target window, ascending.
    pub known: Vec<Delivery>,
    /// The most recent base in the window followed by every later patch.
    /// Empty when the window holds no base.
    pub chain: Vec<Delivery>,
}

impl Resolution {
    pub fn base(&self) -> Option<&Delivery> {
        self.chain.first()
    }

    pub fn oldest_known(&self) -> Option<Timestamp> {
        self.known.first().map(|d| d.timestamp)
    }

    pub fn newest_known(&self) -> Option<Timestamp> {
        self.known.last().map(|d| d.timestamp)
    }

    /// Patches of the window that precede the anchoring base and can never be
    /// applied.
    pub fn orphans(&self) -> impl Iterator<Item = &Delivery> {
        let cutoff = self.base().map(|b| b.timestamp);
        self.known
            .iter()
            .filter(move |d| !d.is_base() && cutoff.is_none_or(|c| d.timestamp < c))
    }
}

/// Read-only view of one corpus's archives in a cache directory.
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    dir: PathBuf,
    corpus: Corpus,
    config: CorpusConfig,
}

impl ArchiveCache {
    pub fn new(dir: impl Into<PathBuf>, corpus: Corpus, config: CorpusConfig) -> Self {
        Self {
            dir: dir.into(),
            corpus,
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn corpus(&self) -> Corpus {
        self.corpus
    }

    /// Path an archive for `delivery` has (or would have) in the cache.
    pub fn path_of(&self, delivery: &Delivery) -> PathBuf {
        self.dir.join(self.config.local_name(self.corpus, delivery))
    }

    pub fn contains(&self, delivery: &Delivery) -> bool {
        self.path_of(delivery).is_file()
    }

    /// Every cached delivery of this corpus, ascending, duplicates collapsed.
    ///
    /// A missing cache directory is an empty cache.
    pub fn scan(&self) -> Result<Vec<Delivery>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_at(&self.dir)(e)),
        };

        let mut found = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(io_at(&self.dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match self.config.parse_local(self.corpus, name) {
                Some(delivery) => {
                    found.insert(delivery);
                }
                None => debug!(corpus = %self.corpus, file = name, "ignoring cache entry"),
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Resolve `target` into the known window and its usable chain.
    pub fn resolve(&self, target: Target) -> Result<Resolution, StoreError> {
        let all = self.scan()?;
        let resolution = resolve_window(target.window(&all));
        debug!(
            corpus = %self.corpus,
            %target,
            known = resolution.known.len(),
            chain = resolution.chain.len(),
            "resolved cache"
        );
        Ok(resolution)
    }
}

/// Split a sorted window into the known list and its chain.
///
/// Only the latest base anchors a valid chain; patches before it are orphaned.
pub fn resolve_window(known: Vec<Delivery>) -> Resolution {
    let chain = match known.iter().rposition(Delivery::is_base) {
        Some(i) => known[i..].to_vec(),
        None => Vec::new(),
    };
    Resolution { known, chain }
}
