// Copy every object under a user's prefix from the content store to the
// matching path under the local root.

use std::path::{Path, PathBuf};

use ghsync_common::path::{is_directory_marker, relative_path_for_key};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::storage::{ContentStore, ObjectKeys, StorageError};
use crate::workspace::WorkspaceGuard;

/// What a materialization pass wrote, in the order it was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub files: Vec<PathBuf>,
    pub bytes: u64,
    pub skipped_markers: usize,
}

/// Mirrors store keys under a fixed local root: key `u1/notes/p1/a.md`
/// becomes `<root>/u1/notes/p1/a.md`.
///
/// A bare prefix such as `u1` also matches `u10/...`, so writes can land
/// beside the job's workspace. Any top-level entry under the root that the
/// pass creates, other than the workspace itself, is adopted by the
/// workspace guard and removed with it.
pub struct StorageMaterializer<'a> {
    store: &'a dyn ContentStore,
    local_root: &'a Path,
}

impl<'a> StorageMaterializer<'a> {
    pub fn new(store: &'a dyn ContentStore, local_root: &'a Path) -> Self {
        Self { store, local_root }
    }

    /// List the whole prefix first, then copy objects one at a time in
    /// listing order. Stops at the first failure; files already written stay
    /// on disk.
    pub async fn materialize(
        &self,
        prefix: &str,
        workspace: &mut WorkspaceGuard,
    ) -> Result<MaterializeReport, StorageError> {
        let listed = ObjectKeys::new(self.store, prefix).drain().await?;

        let mut report = MaterializeReport::default();
        let keys: Vec<String> = listed
            .into_iter()
            .filter(|key| {
                let marker = is_directory_marker(key);
                if marker {
                    report.skipped_markers += 1;
                }
                !marker
            })
            .collect();

        for key in &keys {
            let (path, bytes) = self.copy_object(key, workspace).await?;
            debug!(%key, path = %path.display(), bytes, "object materialized");
            report.files.push(path);
            report.bytes += bytes;
        }

        Ok(report)
    }

    /// Reader and destination file live only in this scope, so both are
    /// closed whichever way it exits.
    async fn copy_object(
        &self,
        key: &str,
        workspace: &mut WorkspaceGuard,
    ) -> Result<(PathBuf, u64), StorageError> {
        let relative = relative_path_for_key(key)
            .map_err(|source| StorageError::UnsafeKey { key: key.to_string(), source })?;

        let mut reader = self.store.open(key).await?;

        self.claim_top_level(&relative, workspace);
        let destination = self.local_root.join(relative);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::CreateDir { path: parent.to_path_buf(), source })?;
        }

        let mut file = tokio::fs::File::create(&destination)
            .await
            .map_err(|source| StorageError::CreateFile { path: destination.clone(), source })?;

        let copy_error = |source: std::io::Error| StorageError::Copy {
            key: key.to_string(),
            path: destination.clone(),
            source,
        };
        let bytes = tokio::io::copy(&mut reader, &mut file).await.map_err(copy_error)?;
        file.flush().await.map_err(copy_error)?;

        Ok((destination, bytes))
    }

    fn claim_top_level(&self, relative: &Path, workspace: &mut WorkspaceGuard) {
        let Some(first) = relative.components().next() else {
            return;
        };
        let top = self.local_root.join(first);
        if top != workspace.path() && !top.exists() {
            workspace.adopt(top);
        }
    }
}
