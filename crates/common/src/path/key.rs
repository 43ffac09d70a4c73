// Object key validation: maps a content-store key onto a relative local path
// without letting it escape the directory it is joined onto.

use std::path::PathBuf;

use thiserror::Error;

/// Separator used by object keys, independent of the host platform.
pub const KEY_SEPARATOR: char = '/';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("object key is empty")]
    Empty,

    #[error("object key contains null byte")]
    NullByte,

    #[error("object key is absolute: {0}")]
    Absolute(String),

    #[error("object key contains directory traversal component: {0}")]
    Traversal(String),

    #[error("object key contains an empty component: {0}")]
    EmptyComponent(String),
}

/// True for pseudo-directory entries (`"u1/notes/"`) that carry no content.
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with(KEY_SEPARATOR)
}

/// Convert an object key into a relative path, one component per key segment.
///
/// Unlike document paths, keys are not normalized: the local layout must
/// mirror the store byte for byte, so anything that would need rewriting is
/// rejected instead.
pub fn relative_path_for_key(key: &str) -> Result<PathBuf, KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }

    if key.contains('\0') {
        return Err(KeyError::NullByte);
    }

    if key.starts_with(KEY_SEPARATOR) {
        return Err(KeyError::Absolute(key.to_string()));
    }

    let mut path = PathBuf::new();
    for component in key.split(KEY_SEPARATOR) {
        match component {
            "" => return Err(KeyError::EmptyComponent(key.to_string())),
            "." | ".." => return Err(KeyError::Traversal(component.to_string())),
            segment => path.push(segment),
        }
    }

    Ok(path)
}
