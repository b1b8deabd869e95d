//! Filesystem helpers used across the pipeline.
//!
//! Thin wrappers around `std::fs` that attach the offending path to every
//! error, so failures deep in a render surface with usable context.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Ensure a directory exists, creating it and all parents if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        anyhow::bail!("path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Write raw bytes, creating the parent directory when needed.
pub fn write_bytes(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, content).with_context(|| format!("failed to write: {}", path.display()))
}

/// Read a whole file into memory.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read: {}", path.display()))
}

/// Allocate a temporary file and return its (kept) path.
///
/// The caller owns the path; cleanup happens through the orchestrator's
/// temp-file set, not through RAII, because the path is handed to an
/// external process.
pub fn keep_temp_file() -> Result<PathBuf> {
    let file = tempfile::NamedTempFile::new().context("failed to create temporary file")?;
    let path = file.into_temp_path().keep().context("failed to persist temporary file")?;
    Ok(path)
}

/// Allocate a fresh unique directory under the system temp location.
pub fn keep_temp_dir(prefix: &str) -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .context("failed to create temporary directory")?;
    Ok(dir.keep())
}
