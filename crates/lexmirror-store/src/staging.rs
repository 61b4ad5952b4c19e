//! Staged extraction and overlay into a live mirror.
//!
//! Archives are unpacked into a scratch directory next to the mirror (same
//! filesystem, so moves are renames), the corpus tree is located inside the
//! published layout, and its files are moved over the mirror. Existing paths
//! are replaced: last write wins.

use std::fs;
use std::path::{Component, Path, PathBuf};

use lexmirror_core::{Corpus, Delivery, format_timestamp};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::StoreError;
use crate::error::io_at;
use crate::extract::Extractor;

/// Scratch directory holding one extracted archive.
pub(crate) struct Staging {
    dir: TempDir,
    corpus: Corpus,
    delivery: Delivery,
}

impl Staging {
    /// Extract `archive` into a fresh scratch directory under `parent`.
    pub(crate) fn extract(
        extractor: &dyn Extractor,
        archive: &Path,
        parent: &Path,
        corpus: Corpus,
        delivery: Delivery,
    ) -> Result<Self, StoreError> {
        fs::create_dir_all(parent).map_err(io_at(parent))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!(".staging-{}-", corpus.dir_name()))
            .tempdir_in(parent)
            .map_err(io_at(parent))?;
        extractor.extract(archive, dir.path())?;
        Ok(Self {
            dir,
            corpus,
            delivery,
        })
    }

    /// Top of the published layout: patches extract under a directory named
    /// after their own timestamp, base dumps extract directly.
    fn layout_root(&self) -> PathBuf {
        let stamped = self.dir.path().join(format_timestamp(&self.delivery.timestamp));
        if stamped.is_dir() {
            stamped
        } else {
            self.dir.path().to_path_buf()
        }
    }

    /// Directory whose content mirrors the corpus tree, if the archive has one.
    ///
    /// A base dump may ship the tree at the top of its layout. A patch only
    /// contributes its corpus directory; other top-level entries are ignored.
    pub(crate) fn tree_root(&self) -> Result<Option<PathBuf>, StoreError> {
        let root = self.layout_root();
        let corpus_name = self.corpus.dir_name();
        let corpus_dir = root.join(&corpus_name);
        if self.delivery.is_base() {
            return Ok(Some(if corpus_dir.is_dir() { corpus_dir } else { root }));
        }
        for entry in fs::read_dir(&root).map_err(io_at(&root))? {
            let name = entry.map_err(io_at(&root))?.file_name();
            if name != corpus_name.as_str() {
                warn!(
                    corpus = %self.corpus,
                    delivery = %self.delivery,
                    entry = %name.to_string_lossy(),
                    "unexpected entry in patch archive; ignored"
                );
            }
        }
        Ok(corpus_dir.is_dir().then_some(corpus_dir))
    }

    /// Take the top-level manifest named `name` out of the staged layout.
    pub(crate) fn take_manifest(&self, name: &str, dest: &Path) -> Result<bool, StoreError> {
        let src = self.layout_root().join(name);
        if !src.is_file() {
            return Ok(false);
        }
        fs::rename(&src, dest).map_err(io_at(dest))?;
        Ok(true)
    }

    pub(crate) fn discard(self) -> Result<(), StoreError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(io_at(path))
    }
}

/// Move every file under `src` to the same relative path under `dst`.
///
/// Returns the number of files moved.
pub(crate) fn overlay(src: &Path, dst: &Path) -> Result<u64, StoreError> {
    fs::create_dir_all(dst).map_err(io_at(dst))?;
    // Listed up front: the walk must not observe its own renames.
    let entries = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| walk_error(src, e))?;

    let mut moved = 0;
    for entry in entries {
        let from = entry.path();
        let rel = from.strip_prefix(src).map_err(|e| StoreError::Io {
            path: from.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        let to = dst.join(rel);

        if entry.file_type().is_dir() {
            if to.exists() && !to.is_dir() {
                fs::remove_file(&to).map_err(io_at(&to))?;
            }
            fs::create_dir_all(&to).map_err(io_at(&to))?;
        } else {
            if to.is_dir() {
                fs::remove_dir_all(&to).map_err(io_at(&to))?;
            }
            fs::rename(from, &to).map_err(io_at(&to))?;
            moved += 1;
        }
    }
    Ok(moved)
}

fn walk_error(root: &Path, e: walkdir::Error) -> StoreError {
    let path = e.path().unwrap_or(root).to_path_buf();
    StoreError::Io {
        path,
        source: e.into(),
    }
}

/// Remove the files named by a deletion list, relative to `mirror_root`.
///
/// One path per line; a leading `<corpus dir>/` component is dropped since
/// published lists are rooted above the corpus tree. Blank lines are skipped,
/// absent files are not an error and directories are never removed. Returns
/// the number of paths removed.
pub(crate) fn apply_deletions(
    list: &Path,
    mirror_root: &Path,
    corpus: Corpus,
) -> Result<usize, StoreError> {
    let content = fs::read_to_string(list).map_err(io_at(list))?;
    let prefix = corpus.dir_name();
    let mut removed = 0;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let rel = mirror_relative(line, &prefix).ok_or_else(|| StoreError::ArchiveUnreadable {
            path: list.to_path_buf(),
            reason: format!("deletion entry escapes the mirror: {line:?}"),
        })?;
        let target = mirror_root.join(&rel);
        let outcome = match fs::symlink_metadata(&target) {
            Ok(meta) if meta.is_dir() => {
                warn!(path = %rel.display(), "deletion entry names a directory; skipped");
                continue;
            }
            Ok(_) => fs::remove_file(&target),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %rel.display(), "deletion target already absent");
                continue;
            }
            Err(e) => Err(e),
        };
        outcome.map_err(io_at(&target))?;
        removed += 1;
    }
    Ok(removed)
}

fn mirror_relative(line: &str, corpus_dir: &str) -> Option<PathBuf> {
    let path = Path::new(line);
    let mut components = path.components().peekable();
    if let Some(Component::Normal(first)) = components.peek()
        && *first == corpus_dir
    {
        components.next();
    }
    let mut rel = PathBuf::new();
    for c in components {
        match c {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if rel.as_os_str().is_empty() { None } else { Some(rel) }
}
