use std::path::{Component, Path, PathBuf};

use crate::HandlerError;

/// Validates an upload target against the served root directory.
///
/// Rejects:
/// - Empty paths
/// - Relative paths
/// - Parent directory traversal (`..`)
/// - Paths outside `root`, or the root itself
/// - Targets whose parent directory does not exist
pub fn validate_target(root: &Path, target: &str) -> Result<PathBuf, HandlerError> {
    if target.is_empty() {
        return Err(HandlerError::protocol("empty path"));
    }

    let path = Path::new(target);
    if !path.is_absolute() {
        return Err(HandlerError::protocol(format!(
            "path must be absolute: {target}"
        )));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(HandlerError::protocol(format!(
                    "parent directory traversal not allowed: {target}"
                )));
            }
            Component::CurDir => {}
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component);
            }
        }
    }

    if !normalized.starts_with(root) || normalized == root {
        return Err(HandlerError::protocol(format!(
            "path is outside the served root {}: {target}",
            root.display()
        )));
    }

    let (Some(parent), Some(name)) = (normalized.parent(), normalized.file_name()) else {
        return Err(HandlerError::protocol(format!("path names no file: {target}")));
    };
    if !parent.is_dir() {
        return Err(HandlerError::protocol(format!(
            "parent directory does not exist: {target}"
        )));
    }

    // Symlinks inside the root may point anywhere; confine the resolved path.
    let parent = std::fs::canonicalize(parent).map_err(|e| {
        HandlerError::protocol(format!("cannot resolve parent directory of {target}: {e}"))
    })?;
    if !parent.starts_with(root) {
        return Err(HandlerError::protocol(format!(
            "path resolves outside the served root {}: {target}",
            root.display()
        )));
    }

    let resolved = parent.join(name);
    if std::fs::symlink_metadata(&resolved).is_ok_and(|m| m.file_type().is_symlink()) {
        return Err(HandlerError::protocol(format!(
            "target is a symbolic link: {target}"
        )));
    }
    Ok(resolved)
}
