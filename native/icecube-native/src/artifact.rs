//! Artifact persistence.
//!
//! Writes are whole-file: content goes to a temporary file in the target
//! directory which is then renamed over the destination, so readers never see
//! a partially written artifact.

use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{IceCubeError, Result};

/// Create `dir` and its parents if missing. New directories are `0750` on Unix.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(dir).map_err(|e| IceCubeError::io(dir, e))
}

/// Atomically replace `path` with `content`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| IceCubeError::io(dir, e))?;
    if let Err(e) = tmp.write_all(content).and_then(|_| tmp.flush()) {
        return Err(IceCubeError::io(tmp.path(), e));
    }
    // Temp files are created 0600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(|e| IceCubeError::io(tmp.path(), e))?;
    }
    tmp.persist(path)
        .map_err(|e| IceCubeError::io(path, e.error))?;
    Ok(())
}

/// Write `content` unless `path` already holds exactly these bytes.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == content.as_bytes() {
            debug!(path = %path.display(), "artifact unchanged, skipping write");
            return Ok(false);
        }
    }

    write_atomic(path, content.as_bytes())?;
    debug!(path = %path.display(), bytes = content.len(), "artifact written");
    Ok(true)
}
