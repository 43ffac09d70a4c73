// Process-wide, single-flight initialization of the content-store client and
// committer identity.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::{CommitterIdentity, StorageBackend, WorkerConfig};
use crate::git::{CommandExecutor, GitWorker};
use crate::storage::{ContentStore, FsContentStore, S3ContentStore};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitializationError {
    #[error("content store client setup failed: {0}")]
    StoreClient(String),

    #[error("committer identity is not configured (GIT_COMMITTER_NAME / GIT_COMMITTER_EMAIL)")]
    MissingIdentity,

    #[error("git is not usable: {0}")]
    VcsUnavailable(String),
}

/// State shared by every job in this process once setup has succeeded.
pub struct ProcessState {
    pub store: Arc<dyn ContentStore>,
    pub committer: CommitterIdentity,
}

impl std::fmt::Debug for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessState").field("committer", &self.committer).finish_non_exhaustive()
    }
}

pub type InitFuture = Pin<Box<dyn Future<Output = Result<ProcessState, InitializationError>> + Send>>;

type SetupFn = Box<dyn Fn() -> InitFuture + Send + Sync>;

/// Runs `setup` at most once per instance, even under concurrent first use.
///
/// The outcome is cached either way: callers that arrive while setup is in
/// flight wait for it, and every later caller observes the same success or
/// the same error. A failed setup is not retried; the process has to be
/// recycled.
pub struct ProcessInitializer {
    cell: OnceCell<Result<Arc<ProcessState>, InitializationError>>,
    /// `None` only for [`ProcessInitializer::ready`], whose cell starts set.
    setup: Option<SetupFn>,
}

impl ProcessInitializer {
    pub fn new<F>(setup: F) -> Self
    where
        F: Fn() -> InitFuture + Send + Sync + 'static,
    {
        Self { cell: OnceCell::new(), setup: Some(Box::new(setup)) }
    }

    /// Initializer for an already-built state, mainly for embedding and tests.
    pub fn ready(state: ProcessState) -> Self {
        Self { cell: OnceCell::new_with(Some(Ok(Arc::new(state)))), setup: None }
    }

    /// Production setup: build the configured store, check the committer
    /// identity and probe the git binary.
    pub fn from_config<E>(config: &WorkerConfig, executor: E) -> Self
    where
        E: CommandExecutor + Clone + 'static,
    {
        let config = config.clone();
        Self::new(move || -> InitFuture {
            let config = config.clone();
            let executor = executor.clone();
            Box::pin(async move { setup(&config, executor).await })
        })
    }

    pub async fn ensure_initialized(&self) -> Result<Arc<ProcessState>, InitializationError> {
        self.cell
            .get_or_init(|| async {
                let Some(setup) = &self.setup else {
                    unreachable!("ready initializers start initialized");
                };
                match setup().await {
                    Ok(state) => {
                        info!(committer = %state.committer.name, "process initialized");
                        Ok(Arc::new(state))
                    }
                    Err(err) => {
                        // Reported as a job failure by the pipeline.
                        warn!(error = %err, "process initialization failed");
                        Err(err)
                    }
                }
            })
            .await
            .clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

async fn setup<E: CommandExecutor>(
    config: &WorkerConfig,
    executor: E,
) -> Result<ProcessState, InitializationError> {
    if !config.committer.is_complete() {
        return Err(InitializationError::MissingIdentity);
    }

    GitWorker::with_executor(&config.workspace_root, executor)
        .version()
        .await
        .map_err(|err| InitializationError::VcsUnavailable(err.to_string()))?;

    let store: Arc<dyn ContentStore> = match &config.storage.backend {
        StorageBackend::S3 => {
            if config.storage.bucket.trim().is_empty() {
                return Err(InitializationError::StoreClient(
                    "STORAGE_BUCKET_NAME is not set".to_string(),
                ));
            }
            Arc::new(S3ContentStore::from_config(&config.storage).await)
        }
        StorageBackend::Fs { root } => {
            if !root.is_dir() {
                return Err(InitializationError::StoreClient(format!(
                    "content directory {} does not exist",
                    root.display()
                )));
            }
            Arc::new(FsContentStore::new(root, config.storage.page_size as usize))
        }
    };

    Ok(ProcessState { store, committer: config.committer.clone() })
}
