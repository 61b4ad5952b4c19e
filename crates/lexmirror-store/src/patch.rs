//! Patch applier: replay one incremental delivery over a live mirror.
//!
//! A patch archive unpacks to `<timestamp>/<corpus dir>/...` plus, optionally,
//! a deletion-list manifest at `<timestamp>/<deletion list>`. The tree is
//! overlaid onto the mirror, the manifest is moved into the mirror root, and
//! every path it lists is removed. Extraction, overlay, deletions and the
//! metadata update all happen under one flag.

use std::fs;

use lexmirror_core::{CorpusConfig, Delivery, Target, format_timestamp};
use tracing::{debug, info};

use crate::StoreError;
use crate::cache::ArchiveCache;
use crate::error::io_at;
use crate::extract::Extractor;
use crate::mirror::Mirror;
use crate::staging::{Staging, apply_deletions, overlay};

/// What applying a patch changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchOutcome {
    /// Files added or overwritten.
    pub written: u64,
    /// Paths removed through the deletion list.
    pub deleted: usize,
}

/// Apply `patch` to `mirror`, which must be installed at an older delivery.
pub fn apply_patch(
    mirror: &Mirror,
    cache: &ArchiveCache,
    config: &CorpusConfig,
    extractor: &dyn Extractor,
    patch: &Delivery,
) -> Result<PatchOutcome, StoreError> {
    let corpus = mirror.corpus();
    mirror.ensure_coherent()?;
    if patch.is_base() {
        return Err(StoreError::Precondition {
            corpus,
            action: "apply patch",
            reason: format!("{patch} is a base dump"),
        });
    }
    let current = mirror.current()?.ok_or_else(|| StoreError::Precondition {
        corpus,
        action: "apply patch",
        reason: "mirror was never installed".into(),
    })?;
    if current >= patch.timestamp {
        return Err(StoreError::Precondition {
            corpus,
            action: "apply patch",
            reason: format!(
                "mirror at {} is not older than {patch}",
                format_timestamp(&current)
            ),
        });
    }
    let archive = cache.path_of(patch);
    if !archive.is_file() {
        return Err(StoreError::MissingDelivery {
            corpus,
            target: Target::Until(patch.timestamp),
            oldest_known: None,
            installed: Some(current),
        });
    }

    let guard = mirror.lock(format!(
        "applying patch {}",
        format_timestamp(&patch.timestamp)
    ))?;

    let manifest_name = config.deletion_list_name(corpus);
    let manifest = mirror.root().join(&manifest_name);
    // A manifest left by an earlier patch must not be replayed.
    if manifest.is_file() {
        fs::remove_file(&manifest).map_err(io_at(&manifest))?;
    }

    let parent = mirror.root().parent().unwrap_or(mirror.root());
    let staging = Staging::extract(extractor, &archive, parent, corpus, *patch)?;
    let has_manifest = staging.take_manifest(&manifest_name, &manifest)?;
    let written = match staging.tree_root()? {
        Some(tree) => overlay(&tree, mirror.root())?,
        None => {
            debug!(corpus = %corpus, delivery = %patch, "patch carries no corpus tree");
            0
        }
    };
    staging.discard()?;

    let deleted = if has_manifest {
        apply_deletions(&manifest, mirror.root(), corpus)?
    } else {
        debug!(corpus = %corpus, delivery = %patch, "no deletion list");
        0
    };

    mirror.record_applied(&patch.timestamp)?;
    guard.release()?;

    info!(corpus = %corpus, delivery = %patch, written, deleted, "patch applied");
    Ok(PatchOutcome { written, deleted })
}
