// Per-user job workspaces: `<root>/<user_id>`, created fresh for one job and
// removed when the job ends.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("workspace key `{0}` is not a single path component")]
    InvalidWorkspaceKey(String),

    #[error("workspace {} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to create workspace {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Creates isolated working directories under a single root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id)
    }

    /// Create `<root>/<user_id>`. Never reuses or merges with a directory
    /// left behind by another job.
    pub fn create(&self, user_id: &str) -> Result<WorkspaceGuard, FilesystemError> {
        if !is_single_component(user_id) {
            return Err(FilesystemError::InvalidWorkspaceKey(user_id.to_string()));
        }

        let path = self.path_for(user_id);
        match std::fs::create_dir(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "workspace created");
                Ok(WorkspaceGuard { path, adopted: Vec::new(), released: false })
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(FilesystemError::AlreadyExists { path })
            }
            Err(source) => Err(FilesystemError::Create { path, source }),
        }
    }
}

fn is_single_component(key: &str) -> bool {
    let mut components = Path::new(key).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(name)), None) if name == key)
}

/// Live workspace. Removing it is best-effort and happens exactly once:
/// either through [`WorkspaceGuard::destroy`] or when the guard is dropped
/// (early return, panic, or a cancelled job future).
///
/// Paths created on the job's behalf outside the workspace itself can be
/// handed to the guard with [`WorkspaceGuard::adopt`]; they are removed
/// along with it.
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: PathBuf,
    adopted: Vec<PathBuf>,
    released: bool,
}

impl WorkspaceGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove `path` together with the workspace.
    pub fn adopt(&mut self, path: PathBuf) {
        if path != self.path && !self.adopted.contains(&path) {
            debug!(path = %path.display(), "path adopted by workspace");
            self.adopted.push(path);
        }
    }

    pub fn adopted(&self) -> &[PathBuf] {
        &self.adopted
    }

    pub fn destroy(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        remove_tree(&self.path);
        for path in &self.adopted {
            remove_tree(path);
        }
    }
}

fn remove_tree(path: &Path) {
    let removed = match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(error) => Err(error),
    };
    match removed {
        Ok(()) => debug!(path = %path.display(), "workspace removed"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            warn!(path = %path.display(), error = %error, "failed to remove workspace")
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        self.release();
    }
}
