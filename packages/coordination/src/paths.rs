//! Helpers for slash-separated node paths.

use crate::error::CoordError;

pub const ROOT: &str = "/";

/// Checks that `path` is absolute, has no empty segments and no trailing slash.
pub fn validate(path: &str) -> Result<(), CoordError> {
    if !path.starts_with('/') {
        return Err(CoordError::bad_path(path, "path must be absolute"));
    }
    if path == ROOT {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(CoordError::bad_path(path, "trailing slash"));
    }
    if path.contains("//") {
        return Err(CoordError::bad_path(path, "empty segment"));
    }
    if path.contains('\0') {
        return Err(CoordError::bad_path(path, "nul byte"));
    }
    Ok(())
}

pub fn join(parent: &str, child: &str) -> String {
    if parent == ROOT {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Splits a validated non-root path into `(parent, name)`.
pub fn split(path: &str) -> Result<(&str, &str), CoordError> {
    validate(path)?;
    match path.rfind('/') {
        Some(0) if path.len() > 1 => Ok((ROOT, &path[1..])),
        Some(idx) if idx > 0 => Ok((&path[..idx], &path[idx + 1..])),
        _ => Err(CoordError::bad_path(path, "root has no parent")),
    }
}

/// Iterates over the non-empty components of a validated path.
pub fn segments(path: &str) -> Result<impl Iterator<Item = &str>, CoordError> {
    validate(path)?;
    Ok(path.split('/').filter(|segment| !segment.is_empty()))
}
