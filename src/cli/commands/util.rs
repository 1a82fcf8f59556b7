use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use clipserve::derive_db_path;

pub(crate) fn require_store_path(path: Option<&Path>) -> Result<&Path> {
    match path {
        Some(p) => Ok(p),
        None => bail!("specify --db PATH for this command"),
    }
}

/// Paths without an extension get the `clipserve.db` one.
pub(crate) fn resolve_db_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        derive_db_path(&path.to_string_lossy())
    }
}
