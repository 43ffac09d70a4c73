// Scripted command executor shared by unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::worker::{CommandExecutor, CommandFuture, CommandResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) cwd: PathBuf,
}

impl Invocation {
    /// First argument that is not part of a leading `-c key=value` pair.
    pub(crate) fn subcommand(&self) -> &str {
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == "-c" {
                args.next();
                continue;
            }
            return arg;
        }
        ""
    }
}

/// Records every invocation and answers from a queue of canned results.
/// Once the queue is empty every command succeeds with no output.
#[derive(Clone, Default)]
pub(crate) struct RecordingExecutor {
    calls: Arc<Mutex<Vec<Invocation>>>,
    responses: Arc<Mutex<VecDeque<Result<CommandResult, std::io::Error>>>>,
}

impl RecordingExecutor {
    pub(crate) fn new(responses: Vec<Result<CommandResult, std::io::Error>>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().expect("mock calls lock poisoned").clone()
    }

    pub(crate) fn subcommands(&self) -> Vec<String> {
        self.calls().iter().map(|call| call.subcommand().to_string()).collect()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute<'a>(
        &'a self,
        program: &'a str,
        args: &'a [String],
        cwd: &'a Path,
    ) -> CommandFuture<'a> {
        self.calls.lock().expect("mock calls lock poisoned").push(Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        });

        let response = self
            .responses
            .lock()
            .expect("mock responses lock poisoned")
            .pop_front()
            .unwrap_or_else(|| ok(""));
        Box::pin(async move { response })
    }
}

pub(crate) fn ok(stdout: &str) -> Result<CommandResult, std::io::Error> {
    Ok(CommandResult { success: true, code: Some(0), stdout: stdout.to_string(), stderr: String::new() })
}

pub(crate) fn failed(code: i32, stderr: &str) -> Result<CommandResult, std::io::Error> {
    Ok(CommandResult {
        success: false,
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}
