// A local directory served as a content store.
//
// Keys are `/`-joined paths relative to the root, listed in lexicographic
// order like an object store would. Every directory also shows up as a
// `<dir>/` marker entry.

use std::io;
use std::path::{Path, PathBuf};

use ghsync_common::path::key::KEY_SEPARATOR;
use ghsync_common::path::relative_path_for_key;

use super::{ContentStore, ObjectPage, ObjectReader, StorageError, StoreFuture};

#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
    page_size: usize,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>, page_size: usize) -> Self {
        Self { root: root.into(), page_size: page_size.max(1) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentStore for FsContentStore {
    fn list_page<'a>(
        &'a self,
        prefix: &'a str,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, ObjectPage> {
        Box::pin(async move {
            let root = self.root.clone();
            let list_error = |message: String| StorageError::List {
                prefix: prefix.to_string(),
                message,
            };

            let mut keys = tokio::task::spawn_blocking(move || collect_keys(&root))
                .await
                .map_err(|error| list_error(error.to_string()))?
                .map_err(|error| list_error(error.to_string()))?;

            keys.retain(|key| {
                key.starts_with(prefix) && continuation.is_none_or(|token| key.as_str() > token)
            });

            let has_more = keys.len() > self.page_size;
            keys.truncate(self.page_size);
            let next_token = if has_more { keys.last().cloned() } else { None };
            Ok(ObjectPage { keys, next_token })
        })
    }

    fn open<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ObjectReader> {
        Box::pin(async move {
            let relative = relative_path_for_key(key)
                .map_err(|source| StorageError::UnsafeKey { key: key.to_string(), source })?;
            let file = tokio::fs::File::open(self.root.join(relative)).await.map_err(|error| {
                StorageError::Read { key: key.to_string(), message: error.to_string() }
            })?;
            let reader: ObjectReader = Box::pin(file);
            Ok(reader)
        })
    }
}

fn collect_keys(root: &Path) -> io::Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative) = pending.pop() {
        for entry in std::fs::read_dir(root.join(&relative))? {
            let entry = entry?;
            let child = relative.join(entry.file_name());
            let key = key_for(&child);
            if entry.file_type()?.is_dir() {
                keys.push(format!("{key}{KEY_SEPARATOR}"));
                pending.push(child);
            } else {
                keys.push(key);
            }
        }
    }

    keys.sort();
    Ok(keys)
}

fn key_for(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(&KEY_SEPARATOR.to_string())
}
