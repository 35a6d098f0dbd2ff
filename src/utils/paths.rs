use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Expands tilde in path to home directory
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    if let Some(path_str) = path.to_str()
        && (path_str.starts_with("~/") || path_str == "~")
    {
        let home = dirs::home_dir().context("Could not find home directory")?;
        if path_str == "~" {
            return Ok(home);
        }
        return Ok(home.join(&path_str[2..]));
    }
    Ok(path.to_path_buf())
}

/// Makes a path absolute, resolving relative paths from current directory
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined
pub fn make_absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir()?;
        Ok(current_dir.join(path))
    }
}

/// Resolve a configured directory: expand `~`, make absolute, and canonicalize
/// when the directory exists.
///
/// # Errors
///
/// Returns an error if the home or current directory cannot be determined
pub fn resolve_dir(path: &Path) -> Result<PathBuf> {
    let absolute = make_absolute(&expand_tilde(path)?)?;
    Ok(absolute
        .canonicalize()
        .unwrap_or_else(|_| normalize_lexically(&absolute)))
}

/// Remove `.` components and fold `..` into the preceding component without
/// touching the filesystem
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Key under which a source path is stored in the name map.
///
/// Paths under `root` become relative to it; relative paths are taken as
/// already relative to `root`. Paths outside `root` stay absolute.
#[must_use]
pub fn source_key(root: &Path, path: &Path) -> PathBuf {
    let normalized = normalize_lexically(path);
    if normalized.is_absolute() {
        normalized
            .strip_prefix(root)
            .map_or_else(|_| normalized.clone(), Path::to_path_buf)
    } else {
        normalized
    }
}

/// Check whether any directory component of `relative` satisfies `is_ignored`.
///
/// Matching is per path segment, so `build` never matches `rebuild` or
/// `build.js`. The final component (the file itself) is not checked.
#[must_use]
pub fn has_ignored_segment(relative: &Path, is_ignored: impl Fn(&str) -> bool) -> bool {
    relative.parent().is_some_and(|parent| {
        parent.components().any(|c| match c {
            Component::Normal(part) => part.to_str().is_some_and(&is_ignored),
            _ => false,
        })
    })
}

/// Render a path with `/` separators regardless of platform
#[must_use]
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
