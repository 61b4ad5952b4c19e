//! Archive extraction: tar + gzip, overwriting existing paths.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::StoreError;
use crate::error::io_at;

/// Unpacks an archive into a directory.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, target_dir: &Path) -> Result<(), StoreError>;
}

/// The publisher's format: gzip-compressed tarballs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzExtractor;

impl Extractor for TarGzExtractor {
    fn extract(&self, archive: &Path, target_dir: &Path) -> Result<(), StoreError> {
        let file = File::open(archive).map_err(io_at(archive))?;
        std::fs::create_dir_all(target_dir).map_err(io_at(target_dir))?;

        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.set_overwrite(true);
        tar.set_preserve_mtime(true);
        // Entries that would escape `target_dir` are skipped by `unpack`.
        tar.unpack(target_dir)
            .map_err(|e| StoreError::ArchiveUnreadable {
                path: archive.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!(archive = %archive.display(), target = %target_dir.display(), "extracted");
        Ok(())
    }
}
