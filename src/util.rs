//! Small filesystem helpers shared by the index and the source adapter.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::Result;
use tracing::debug;

/// Modification time of `path` in seconds since the epoch, 0.0 if the file
/// does not exist.
pub fn file_mtime(path: &Path) -> f64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Replace `copy` with a copy of `source` if `source` is newer or `copy`
/// doesn't exist yet. Returns the path of the copy.
///
/// The live source database is locked by its owning application, so all
/// reads go through a private copy.
pub fn copy_if_newer(source: &Path, copy: &Path) -> Result<PathBuf> {
    if !copy.exists() || file_mtime(source) > file_mtime(copy) {
        if let Some(parent) = copy.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(from = %source.display(), to = %copy.display(), "copying database");
        std::fs::copy(source, copy)?;
    }
    Ok(copy.to_path_buf())
}
