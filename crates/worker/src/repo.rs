// Repository side of a job: clone into the workspace, then stage, commit and
// push the synced file from the clone.

use std::path::{Path, PathBuf};

use ghsync_common::Job;
use tracing::debug;

use crate::config::CommitterIdentity;
use crate::git::{CommandExecutor, GitRemote, GitWorker, GitWorkerError};

/// Clones a job's target repository into its workspace.
#[derive(Debug, Clone)]
pub struct RepositoryCloner<E> {
    remote: GitRemote,
    executor: E,
}

impl<E: CommandExecutor + Clone> RepositoryCloner<E> {
    pub fn new(remote: GitRemote, executor: E) -> Self {
        Self { remote, executor }
    }

    /// Runs `git clone` with the workspace as working directory and returns
    /// `<workspace>/<repo_name>`.
    pub async fn clone_into(&self, job: &Job, workspace: &Path) -> Result<PathBuf, GitWorkerError> {
        let url = self.remote.clone_url(job.credential(), &job.owner, &job.repo_name)?;
        GitWorker::with_executor(workspace, self.executor.clone()).clone_repo(&url).await?;

        let repo_dir = workspace.join(&job.repo_name);
        debug!(repo_dir = %repo_dir.display(), "repository cloned");
        Ok(repo_dir)
    }
}

/// Stages, commits and pushes inside one cloned repository.
pub struct CommitPublisher<'a, E> {
    git: GitWorker<E>,
    committer: &'a CommitterIdentity,
}

impl<'a, E: CommandExecutor> CommitPublisher<'a, E> {
    pub fn new(repo_dir: impl Into<PathBuf>, executor: E, committer: &'a CommitterIdentity) -> Self {
        Self { git: GitWorker::with_executor(repo_dir, executor), committer }
    }

    /// `git add <project>/<file>`. The path is not checked for existence;
    /// git reports a missing pathspec itself.
    pub async fn stage(&self, job: &Job) -> Result<(), GitWorkerError> {
        self.git.add(&[job.relative_file_path()]).await?;
        Ok(())
    }

    /// Commit with the process committer identity. An empty change set is
    /// left for git to reject.
    pub async fn commit(&self, job: &Job) -> Result<(), GitWorkerError> {
        self.git.commit_as(self.committer, &job.commit_message).await?;
        Ok(())
    }

    pub async fn push(&self) -> Result<(), GitWorkerError> {
        self.git.push_upstream().await?;
        Ok(())
    }
}
