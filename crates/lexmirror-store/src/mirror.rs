//! Mirror directory and its metadata records.
//!
//! Each corpus is materialised in `<mirrors>/<corpus dir>/`. Next to the legal
//! texts the directory holds `delivery.txt` (the applied delivery) and
//! `history.txt` (every applied delivery, oldest first).

use std::fs;
use std::path::{Path, PathBuf};

use lexmirror_core::{Corpus, Timestamp, format_timestamp, parse_timestamp};
use tracing::{info, warn};

use crate::StoreError;
use crate::error::io_at;
use crate::flag::{self, FLAG_FILE, FlagGuard};
use crate::fs_util::{append_line, atomic_write, read_optional};

pub const DELIVERY_FILE: &str = "delivery.txt";
pub const HISTORY_FILE: &str = "history.txt";

/// Files in the mirror root that belong to lexmirror, not to the corpus.
pub const METADATA_FILES: &[&str] = &[FLAG_FILE, DELIVERY_FILE, HISTORY_FILE];

/// Snapshot of a mirror's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MirrorState {
    pub current: Option<Timestamp>,
    pub history: Vec<Timestamp>,
    /// Operation named by a leftover in-progress flag.
    pub flag: Option<String>,
}

/// The on-disk mirror of one corpus.
#[derive(Debug, Clone)]
pub struct Mirror {
    corpus: Corpus,
    root: PathBuf,
}

impl Mirror {
    pub fn new(mirrors_dir: &Path, corpus: Corpus) -> Self {
        Self {
            corpus,
            root: mirrors_dir.join(corpus.dir_name()),
        }
    }

    pub fn corpus(&self) -> Corpus {
        self.corpus
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Whether the directory holds anything besides lexmirror's own files.
    pub fn has_content(&self) -> Result<bool, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_at(&self.root)(e)),
        };
        for entry in entries {
            let entry = entry.map_err(io_at(&self.root))?;
            let name = entry.file_name();
            if !METADATA_FILES.iter().any(|m| name == *m) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Currently applied delivery, or `None` if never installed.
    pub fn current(&self) -> Result<Option<Timestamp>, StoreError> {
        let path = self.root.join(DELIVERY_FILE);
        match read_optional(&path)? {
            None => Ok(None),
            Some(content) => parse_timestamp(&content)
                .map(Some)
                .map_err(|_| StoreError::CorruptMetadata { path, content }),
        }
    }

    /// Every applied delivery, oldest first.
    pub fn history(&self) -> Result<Vec<Timestamp>, StoreError> {
        let path = self.root.join(HISTORY_FILE);
        let Some(content) = read_optional(&path)? else {
            return Ok(Vec::new());
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                parse_timestamp(l).map_err(|_| StoreError::CorruptMetadata {
                    path: path.clone(),
                    content: l.to_string(),
                })
            })
            .collect()
    }

    pub fn state(&self) -> Result<MirrorState, StoreError> {
        Ok(MirrorState {
            current: self.current()?,
            history: self.history()?,
            flag: flag::read_flag(&self.root)?,
        })
    }

    /// Fail with `IncoherentMirror` if an in-progress flag is present.
    pub fn ensure_coherent(&self) -> Result<(), StoreError> {
        flag::ensure_unflagged(self.corpus, &self.root)
    }

    /// Take the flag for `operation`.
    pub fn lock(&self, operation: impl Into<String>) -> Result<FlagGuard, StoreError> {
        FlagGuard::acquire(self.corpus, &self.root, operation)
    }

    /// Record `ts` as applied: replace the current delivery, append to history.
    ///
    /// Only called from inside a flag-guarded operation, after its file
    /// changes are complete.
    pub(crate) fn record_applied(&self, ts: &Timestamp) -> Result<(), StoreError> {
        let formatted = format_timestamp(ts);
        atomic_write(&self.root.join(DELIVERY_FILE), formatted.as_bytes())?;
        append_line(&self.root.join(HISTORY_FILE), &formatted)?;
        Ok(())
    }

    /// Delete the whole mirror content and its metadata under the flag.
    ///
    /// Used when the installed delivery predates the only base still cached.
    pub fn wipe(&self) -> Result<(), StoreError> {
        let guard = self.lock("wiping mirror")?;
        warn!(corpus = %self.corpus, dir = %self.root.display(), "wiping mirror");
        for entry in fs::read_dir(&self.root).map_err(io_at(&self.root))? {
            let entry = entry.map_err(io_at(&self.root))?;
            if entry.file_name() == FLAG_FILE {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().map_err(io_at(&path))?;
            if file_type.is_dir() {
                fs::remove_dir_all(&path).map_err(io_at(&path))?;
            } else {
                fs::remove_file(&path).map_err(io_at(&path))?;
            }
        }
        guard.release()?;
        info!(corpus = %self.corpus, "mirror wiped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn fresh_mirror_has_no_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(tmp.path(), Corpus::Legi);
        assert_eq!(mirror.root(), tmp.path().join("legi"));
        assert!(!mirror.exists());
        assert_eq!(mirror.state().unwrap(), MirrorState::default());
        assert!(!mirror.has_content().unwrap());
    }

    #[test]
    fn record_applied_updates_current_and_history() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(tmp.path(), Corpus::Legi);
        fs::create_dir_all(mirror.root()).unwrap();
        mirror.record_applied(&ts("20140101-000000")).unwrap();
        mirror.record_applied(&ts("20140102-000000")).unwrap();
        assert_eq!(mirror.current().unwrap(), Some(ts("20140102-000000")));
        assert_eq!(
            mirror.history().unwrap(),
            vec![ts("20140101-000000"), ts("20140102-000000")]
        );
        assert_eq!(
            fs::read_to_string(mirror.root().join(DELIVERY_FILE)).unwrap(),
            "20140102-000000"
        );
        // Metadata alone is not content.
        assert!(!mirror.has_content().unwrap());
    }

    #[test]
    fn corrupt_delivery_file_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(tmp.path(), Corpus::Legi);
        fs::create_dir_all(mirror.root()).unwrap();
        fs::write(mirror.root().join(DELIVERY_FILE), "garbage").unwrap();
        assert!(matches!(
            mirror.current(),
            Err(StoreError::CorruptMetadata { .. })
        ));
    }

    #[test]
    fn wipe_removes_everything_and_releases_flag() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(tmp.path(), Corpus::Legi);
        fs::create_dir_all(mirror.root().join("global/code")).unwrap();
        fs::write(mirror.root().join("global/code/a.xml"), "<a/>").unwrap();
        mirror.record_applied(&ts("20140101-000000")).unwrap();

        mirror.wipe().unwrap();

        assert!(mirror.exists());
        assert!(!mirror.has_content().unwrap());
        assert_eq!(mirror.state().unwrap(), MirrorState::default());
    }

    #[test]
    fn wipe_refuses_flagged_mirror() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mirror = Mirror::new(tmp.path(), Corpus::Legi);
        fs::create_dir_all(mirror.root()).unwrap();
        fs::write(mirror.root().join("keep.xml"), "x").unwrap();
        fs::write(mirror.root().join(FLAG_FILE), "applying patch").unwrap();

        assert!(matches!(
            mirror.wipe(),
            Err(StoreError::IncoherentMirror { .. })
        ));
        assert!(mirror.root().join("keep.xml").exists());
    }
}
