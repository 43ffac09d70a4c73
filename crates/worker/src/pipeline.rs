// One job, start to finish: initialize, create the workspace, clone,
// materialize the user's content, commit, push, clean up.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use ghsync_common::Job;
use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::WorkerConfig;
use crate::git::{CommandExecutor, GitRemote, GitWorkerError, ProcessCommandExecutor};
use crate::init::{InitializationError, ProcessInitializer, ProcessState};
use crate::materialize::{MaterializeReport, StorageMaterializer};
use crate::repo::{CommitPublisher, RepositoryCloner};
use crate::storage::StorageError;
use crate::workspace::{FilesystemError, WorkspaceGuard, WorkspaceManager};

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    MakeWorkingDir,
    CloneRepository,
    Materialize,
    Commit,
    Push,
}

impl Stage {
    /// Name used in logs and error responses.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::MakeWorkingDir => "makeWorkingDir",
            Self::CloneRepository => "cloneGithubRepo",
            Self::Materialize => "writeContentFromStorageToFile",
            Self::Commit => "makeGitCommit",
            Self::Push => "pushToRemote",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Decoded,
    Initialized,
    WorkspaceReady,
    Cloned,
    Materialized,
    Committed,
    Pushed,
    Done,
    Failed(Stage),
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    VcsOperation(#[from] GitWorkerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A job failure: the stage it happened in and the underlying cause.
#[derive(Debug, Error)]
#[error("{stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self { stage, source: source.into() }
    }
}

fn at<S: Into<StageError>>(stage: Stage) -> impl FnOnce(S) -> PipelineError {
    move |source| PipelineError::new(stage, source)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: String,
    pub state: JobState,
    pub materialized: MaterializeReport,
}

/// Runs jobs against a shared initializer and workspace root.
///
/// Jobs are independent: several may run at once on the same pipeline, and
/// only initialization is coordinated between them.
pub struct JobPipeline<E = ProcessCommandExecutor> {
    initializer: Arc<ProcessInitializer>,
    workspaces: WorkspaceManager,
    cloner: RepositoryCloner<E>,
    executor: E,
}

impl JobPipeline<ProcessCommandExecutor> {
    /// Production wiring: real `git` processes, lazily initialized store.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let executor = ProcessCommandExecutor;
        Self::new(
            Arc::new(ProcessInitializer::from_config(config, executor)),
            WorkspaceManager::new(&config.workspace_root),
            GitRemote::parse(&config.remote_base),
            executor,
        )
    }
}

impl<E: CommandExecutor + Clone> JobPipeline<E> {
    pub fn new(
        initializer: Arc<ProcessInitializer>,
        workspaces: WorkspaceManager,
        remote: GitRemote,
        executor: E,
    ) -> Self {
        Self {
            initializer,
            workspaces,
            cloner: RepositoryCloner::new(remote, executor.clone()),
            executor,
        }
    }

    pub fn initializer(&self) -> &Arc<ProcessInitializer> {
        &self.initializer
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run one job to completion. A failure is logged once, here, with its
    /// stage; callers only decide what to report upstream.
    pub async fn run(&self, job: &Job, job_id: &str) -> Result<JobReport, PipelineError> {
        let span = info_span!(
            "job",
            job_id = %job_id,
            user_id = %job.user_id,
            owner = %job.owner,
            repo = %job.repo_name,
        );

        async {
            let mut state = JobState::Decoded;
            let result = self.execute(job, &mut state).await;
            match &result {
                Ok(report) => {
                    info!(files = report.files.len(), bytes = report.bytes, "job completed");
                }
                Err(err) => {
                    state = JobState::Failed(err.stage);
                    error!(stage = err.stage.as_str(), ?state, error = %err.source, "job failed");
                }
            }
            result.map(|materialized| JobReport { job_id: job_id.to_string(), state, materialized })
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        job: &Job,
        state: &mut JobState,
    ) -> Result<MaterializeReport, PipelineError> {
        let process = self.initializer.ensure_initialized().await.map_err(at(Stage::Setup))?;
        advance(state, JobState::Initialized);

        let mut workspace =
            self.workspaces.create(&job.user_id).map_err(at(Stage::MakeWorkingDir))?;
        advance(state, JobState::WorkspaceReady);

        // The guard also removes the workspace, and anything the materializer
        // placed beside it, if this future is dropped before `destroy` runs.
        let outcome = self.sync(job, &process, &mut workspace, state).await;
        workspace.destroy();

        let report = outcome?;
        advance(state, JobState::Done);
        Ok(report)
    }

    async fn sync(
        &self,
        job: &Job,
        process: &ProcessState,
        workspace: &mut WorkspaceGuard,
        state: &mut JobState,
    ) -> Result<MaterializeReport, PipelineError> {
        let repo_dir =
            self.cloner.clone_into(job, workspace.path()).await.map_err(at(Stage::CloneRepository))?;
        advance(state, JobState::Cloned);

        let report = StorageMaterializer::new(&*process.store, self.workspaces.root())
            .materialize(&job.user_id, workspace)
            .await
            .map_err(at(Stage::Materialize))?;
        advance(state, JobState::Materialized);

        let publisher = CommitPublisher::new(repo_dir, self.executor.clone(), &process.committer);
        publisher.stage(job).await.map_err(at(Stage::Commit))?;
        publisher.commit(job).await.map_err(at(Stage::Commit))?;
        advance(state, JobState::Committed);

        publisher.push().await.map_err(at(Stage::Push))?;
        advance(state, JobState::Pushed);

        Ok(report)
    }
}

fn advance(state: &mut JobState, next: JobState) {
    let from = *state;
    debug!(?from, to = ?next, "job state");
    *state = next;
}
