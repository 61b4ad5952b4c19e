//! Small filesystem helpers shared by the mirror metadata and the ledger.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::StoreError;
use crate::error::io_at;

/// Replace `path` with `body` via a temp file in the same directory, so
/// readers see either the old or the new content.
pub(crate) fn atomic_write(path: &Path, body: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_at(parent))?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("metadata");
    let tmp = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));
    {
        let mut f = fs::File::create(&tmp).map_err(io_at(&tmp))?;
        f.write_all(body).map_err(io_at(&tmp))?;
        f.sync_all().map_err(io_at(&tmp))?;
    }
    fs::rename(&tmp, path).map_err(io_at(path))?;
    Ok(())
}

/// Append one line to `path`, creating it if needed.
pub(crate) fn append_line(path: &Path, line: &str) -> Result<(), StoreError> {
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_at(path))?;
    writeln!(f, "{line}").map_err(io_at(path))?;
    f.sync_all().map_err(io_at(path))?;
    Ok(())
}

/// Read a file, treating absence as `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_at(path)(e)),
    }
}
