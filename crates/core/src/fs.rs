//! Filesystem utilities

use std::fs;
use std::path::Path;

use slog::{info, Logger};

/// Create the parent directory of `file_path` (and its ancestors) if missing.
pub fn ensure_parent_dir(file_path: &str, logger: &Logger) -> std::io::Result<()> {
    let Some(parent) = Path::new(file_path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    fs::create_dir_all(parent)?;
    info!(logger, "created directory: {}", parent.display());
    Ok(())
}
