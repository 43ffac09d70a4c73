// Git CLI access: clone, stage, commit, push.

pub mod redact;
pub mod remote;
#[cfg(test)]
pub(crate) mod test_support;
pub mod worker;

pub use remote::GitRemote;
pub use worker::{
    CommandExecutor, CommandFuture, CommandResult, GitCommandOutput, GitWorker, GitWorkerError,
    ProcessCommandExecutor,
};
