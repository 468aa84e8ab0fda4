//! Atomic file persistence: write-temp, fsync, rename (spec.md §5, §9).
//!
//! Every durable write in the runtime (Run State, Evidence Chain,
//! Consequence Memory) goes through [`write_file_atomic`] so a crash
//! mid-write never leaves a resumable run looking at a half-written file.

use camino::Utf8Path;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

use crate::error::ForgeError;

/// Atomically write `content` to `path`: write to a temp file in the same
/// directory, fsync it, then rename over the target. On most platforms
/// rename is already atomic; Windows additionally requires the target not be
/// open elsewhere, which callers of this library control.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<(), ForgeError> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ForgeError::PersistFailure {
                path: path.to_string(),
                reason: format!("failed to create parent directory {parent}: {e}"),
            })?;
        }
    }

    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| ForgeError::PersistFailure {
        path: path.to_string(),
        reason: format!("failed to create temp file in {dir}: {e}"),
    })?;

    temp.write_all(content.as_bytes())
        .map_err(|e| ForgeError::PersistFailure {
            path: path.to_string(),
            reason: format!("failed to write temp file: {e}"),
        })?;
    temp.as_file().sync_all().map_err(|e| ForgeError::PersistFailure {
        path: path.to_string(),
        reason: format!("failed to fsync temp file: {e}"),
    })?;

    temp.persist(path.as_std_path())
        .map_err(|e| ForgeError::PersistFailure {
            path: path.to_string(),
            reason: format!("failed to rename temp file into place: {e}"),
        })?;

    Ok(())
}

/// Read a UTF-8 file, mapping IO errors into [`ForgeError::PersistFailure`]
/// with enough context for a caller to know which file failed to load.
pub fn read_file(path: &Utf8Path) -> Result<String, ForgeError> {
    fs::read_to_string(path.as_std_path()).map_err(|e| ForgeError::PersistFailure {
        path: path.to_string(),
        reason: format!("failed to read file: {e}"),
    })
}
