use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;

use super::redact::redact_credentials;
use crate::config::CommitterIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitWorkerError {
    EmptyAddPaths,
    InvalidRemote { base: String, message: String },
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, output: String },
}

impl Display for GitWorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GitWorkerError::EmptyAddPaths => write!(f, "git add requires at least one path"),
            GitWorkerError::InvalidRemote { base, message } => {
                write!(f, "cannot build clone URL from `{base}`: {message}")
            }
            GitWorkerError::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            GitWorkerError::CommandFailed { command, code, output } => {
                write!(f, "`{command}` failed with code {:?}: {}", code, output.trim())
            }
        }
    }
}

impl Error for GitWorkerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CommandResult, std::io::Error>> + Send + 'a>>;

/// Runs an external program to completion and captures its output.
pub trait CommandExecutor: Send + Sync {
    fn execute<'a>(&'a self, program: &'a str, args: &'a [String], cwd: &'a Path)
        -> CommandFuture<'a>;
}

/// Spawns real processes. The child is killed if the future is dropped, so
/// cancelling a job also stops its in-flight git invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute<'a>(
        &'a self,
        program: &'a str,
        args: &'a [String],
        cwd: &'a Path,
    ) -> CommandFuture<'a> {
        Box::pin(async move {
            let output = Command::new(program)
                .args(args)
                .current_dir(cwd)
                // Never block on an interactive credential prompt.
                .env("GIT_TERMINAL_PROMPT", "0")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await?;
            Ok(CommandResult {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

/// Git CLI bound to one working directory.
#[derive(Debug, Clone)]
pub struct GitWorker<E = ProcessCommandExecutor> {
    work_dir: PathBuf,
    executor: E,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self { work_dir: work_dir.into(), executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(work_dir: impl Into<PathBuf>, executor: E) -> Self {
        Self { work_dir: work_dir.into(), executor }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub async fn version(&self) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["--version".to_string()]).await
    }

    /// `git clone <url>` into a subdirectory of the working directory named
    /// after the repository.
    pub async fn clone_repo(&self, url: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["clone".to_string(), url.to_string()]).await
    }

    pub async fn add<S: AsRef<str>>(&self, paths: &[S]) -> Result<GitCommandOutput, GitWorkerError> {
        if paths.is_empty() {
            return Err(GitWorkerError::EmptyAddPaths);
        }

        let mut args = vec!["add".to_string()];
        args.extend(paths.iter().map(|path| path.as_ref().to_string()));
        self.run(args).await
    }

    /// Commit with an explicit identity instead of whatever global git
    /// config the host happens to carry.
    pub async fn commit_as(
        &self,
        identity: &CommitterIdentity,
        message: &str,
    ) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "-c".to_string(),
            format!("user.name={}", identity.name),
            "-c".to_string(),
            format!("user.email={}", identity.email),
            "commit".to_string(),
            "-m".to_string(),
            message.to_string(),
        ])
        .await
    }

    /// Push the current branch and set its upstream.
    pub async fn push_upstream(&self) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "push".to_string(),
            "-u".to_string(),
            "origin".to_string(),
            "HEAD".to_string(),
        ])
        .await
    }

    async fn run(&self, args: Vec<String>) -> Result<GitCommandOutput, GitWorkerError> {
        let command = redact_credentials(&format!("git {}", args.join(" "))).into_owned();
        let result = self.executor.execute("git", &args, &self.work_dir).await.map_err(|error| {
            GitWorkerError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let output = combined_output(&result.stdout, &result.stderr);
        Err(GitWorkerError::CommandFailed {
            command,
            code: result.code,
            output: redact_credentials(&output).into_owned(),
        })
    }
}

fn combined_output(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, _) => stderr.to_string(),
        (false, true) => stdout.to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::{ok, RecordingExecutor};

    #[tokio::test]
    async fn clone_runs_in_work_dir() {
        let mock = RecordingExecutor::new(vec![ok("")]);
        let worker = GitWorker::with_executor("/tmp/u1", mock.clone());

        worker
            .clone_repo("https://github.com/octo/notes.git")
            .await
            .expect("clone should succeed");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "git");
        assert_eq!(calls[0].args, vec!["clone", "https://github.com/octo/notes.git"]);
        assert_eq!(calls[0].cwd, PathBuf::from("/tmp/u1"));
    }

    #[tokio::test]
    async fn clone_failure_redacts_credential_from_command_and_output() {
        let mock = RecordingExecutor::new(vec![Ok(CommandResult {
            success: false,
            code: Some(128),
            stdout: String::new(),
            stderr: "fatal: unable to access 'https://gho_secret@github.com/octo/notes.git/'\n"
                .to_string(),
        })]);
        let worker = GitWorker::with_executor("/tmp/u1", mock);

        let error = worker
            .clone_repo("https://gho_secret@github.com/octo/notes.git")
            .await
            .expect_err("clone should fail");

        let rendered = error.to_string();
        assert!(!rendered.contains("gho_secret"), "credential leaked: {rendered}");
        assert_eq!(
            error,
            GitWorkerError::CommandFailed {
                command: "git clone https://***@github.com/octo/notes.git".to_string(),
                code: Some(128),
                output: "fatal: unable to access 'https://***@github.com/octo/notes.git/'\n"
                    .to_string(),
            }
        );
    }

    #[tokio::test]
    async fn add_requires_at_least_one_path() {
        let mock = RecordingExecutor::new(Vec::new());
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.add::<&str>(&[]).await.expect_err("add should fail");
        assert_eq!(error, GitWorkerError::EmptyAddPaths);
    }

    #[tokio::test]
    async fn commit_passes_identity_and_message_as_arguments() {
        let mock = RecordingExecutor::new(vec![ok("[main abc123] update\n")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());
        let identity = CommitterIdentity::new("Sync Bot", "bot@example.test");

        worker.commit_as(&identity, "docs: update readme section").await.expect("commit");

        let calls = mock.calls();
        assert_eq!(
            calls[0].args,
            vec![
                "-c",
                "user.name=Sync Bot",
                "-c",
                "user.email=bot@example.test",
                "commit",
                "-m",
                "docs: update readme section"
            ]
        );
    }

    #[tokio::test]
    async fn commit_with_nothing_staged_reports_stdout() {
        let mock = RecordingExecutor::new(vec![Ok(CommandResult {
            success: false,
            code: Some(1),
            stdout: "nothing to commit, working tree clean\n".to_string(),
            stderr: String::new(),
        })]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);
        let identity = CommitterIdentity::new("Sync Bot", "bot@example.test");

        let error = worker.commit_as(&identity, "update").await.expect_err("commit should fail");
        match error {
            GitWorkerError::CommandFailed { code, output, .. } => {
                assert_eq!(code, Some(1));
                assert!(output.contains("nothing to commit"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_sets_upstream_for_current_branch() {
        let mock = RecordingExecutor::new(vec![ok("")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        worker.push_upstream().await.expect("push should succeed");

        assert_eq!(mock.calls()[0].args, vec!["push", "-u", "origin", "HEAD"]);
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_with_command() {
        let mock = RecordingExecutor::new(vec![Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "git not found",
        ))]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.version().await.expect_err("version should fail");
        assert_eq!(
            error,
            GitWorkerError::SpawnFailed {
                command: "git --version".to_string(),
                message: "git not found".to_string(),
            }
        );
    }

    #[test]
    fn combined_output_keeps_both_streams() {
        assert_eq!(combined_output("out\n", "err\n"), "out\nerr\n");
        assert_eq!(combined_output("", "err\n"), "err\n");
        assert_eq!(combined_output("out\n", "  "), "out\n");
    }
}
