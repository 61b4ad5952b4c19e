//! In-progress flag: a durable marker held around every mirror mutation.
//!
//! The flag file is created with exclusive-create before a wipe, base install
//! or patch application and removed only once the operation has fully
//! completed. Its presence at start-up means a previous run was interrupted
//! (or another run is active): the mirror contents cannot be trusted and the
//! caller gets [`StoreError::IncoherentMirror`]. Nothing here ever clears a
//! flag it did not just create.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use lexmirror_core::Corpus;
use tracing::debug;

use crate::StoreError;
use crate::error::io_at;
use crate::fs_util::read_optional;

pub const FLAG_FILE: &str = "install-in-progress.txt";

pub fn flag_path(mirror_dir: &Path) -> PathBuf {
    mirror_dir.join(FLAG_FILE)
}

/// Content of the flag if one is present.
pub fn read_flag(mirror_dir: &Path) -> Result<Option<String>, StoreError> {
    Ok(read_optional(&flag_path(mirror_dir))?.map(|s| s.trim().to_string()))
}

/// Fail with `IncoherentMirror` if a flag is present.
pub fn ensure_unflagged(corpus: Corpus, mirror_dir: &Path) -> Result<(), StoreError> {
    match read_flag(mirror_dir)? {
        Some(operation) => Err(StoreError::IncoherentMirror {
            corpus,
            flag: flag_path(mirror_dir),
            operation,
        }),
        None => Ok(()),
    }
}

/// Proof that this process holds the flag of a mirror.
///
/// Dropping the guard without [`release`](Self::release) leaves the flag on
/// disk, which is exactly what an interrupted operation must look like.
#[must_use = "an unreleased flag marks the mirror incoherent"]
#[derive(Debug)]
pub struct FlagGuard {
    path: PathBuf,
    operation: String,
}

impl FlagGuard {
    /// Create the flag for `operation`, creating the mirror directory if
    /// needed. An existing flag is reported, never overwritten.
    pub fn acquire(
        corpus: Corpus,
        mirror_dir: &Path,
        operation: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let operation = operation.into();
        fs::create_dir_all(mirror_dir).map_err(io_at(mirror_dir))?;
        let path = flag_path(mirror_dir);
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let existing = read_flag(mirror_dir)?.unwrap_or_default();
                return Err(StoreError::IncoherentMirror {
                    corpus,
                    flag: path,
                    operation: existing,
                });
            }
            Err(e) => return Err(io_at(&path)(e)),
        };
        writeln!(file, "{operation}").map_err(io_at(&path))?;
        file.sync_all().map_err(io_at(&path))?;
        debug!(corpus = %corpus, %operation, "flag acquired");
        Ok(Self { path, operation })
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Remove the flag. This must be the last step of the guarded operation.
    pub fn release(self) -> Result<(), StoreError> {
        fs::remove_file(&self.path).map_err(io_at(&self.path))?;
        debug!(operation = %self.operation, "flag released");
        Ok(())
    }
}
