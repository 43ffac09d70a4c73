// Content store access: paged prefix listing and per-object byte streams.

pub mod fs;
pub mod listing;
#[cfg(test)]
pub(crate) mod memory;
pub mod s3;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use ghsync_common::path::KeyError;
use thiserror::Error;
use tokio::io::AsyncRead;

pub use fs::FsContentStore;
pub use listing::ObjectKeys;
pub use s3::S3ContentStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to list objects under prefix `{prefix}`: {message}")]
    List { prefix: String, message: String },

    #[error("failed to read object `{key}`: {message}")]
    Read { key: String, message: String },

    #[error("object key `{key}` cannot be materialized: {source}")]
    UnsafeKey {
        key: String,
        #[source]
        source: KeyError,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create file {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy object `{key}` to {}: {source}", path.display())]
    Copy {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

pub trait ContentStore: Send + Sync {
    /// List keys starting with `prefix`, resuming after `continuation`.
    fn list_page<'a>(
        &'a self,
        prefix: &'a str,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, ObjectPage>;

    /// Open a read stream over one object's content.
    fn open<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ObjectReader>;
}
