//! Path resolution helpers

use std::path::{Path, PathBuf};

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Make a user-supplied path absolute and resolve symlinks
///
/// Paths that do not exist yet (a target library or snapshot about to be
/// created) are made absolute without resolution.
pub fn resolve(path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    if let Ok(canonical) = expanded.canonicalize() {
        return canonical;
    }
    std::path::absolute(&expanded).unwrap_or(expanded)
}
