//! Execution of converter invocations.
//!
//! `Executor` is the seam between the worker pool and the operating system.
//! `ProcessExecutor` spawns the converter and waits for it, `DryRunExecutor` only
//! logs what would have been run.
use std::fs::File;
use std::path::PathBuf;

use super::error::ExecutorError;
use super::invocation::Invocation;

/// How a converter process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    ExitCode(i32),
    /// Killed by a signal, no exit code
    Terminated,
    /// Nothing was run
    DryRun,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::ExitCode(code) => write!(f, "exit code {code}"),
            Self::Terminated => write!(f, "terminated by signal"),
            Self::DryRun => write!(f, "not run (dry run)"),
        }
    }
}

/// Trait for running one invocation to completion.
///
/// Implementations are shared by all workers.
pub trait Executor: Send + Sync {
    fn execute(&self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError>;
}

/// Spawns the converter as a child process and blocks until it exits.
///
/// The child inherits stdout/stderr unless a log directory is given, in which case
/// each run writes to `run_<number>.log` there.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    log_directory: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new(log_directory: Option<PathBuf>) -> Self {
        Self { log_directory }
    }

    fn log_file(&self, run_number: i32) -> Option<PathBuf> {
        self.log_directory
            .as_ref()
            .map(|dir| dir.join(format!("run_{run_number}.log")))
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError> {
        let mut command = invocation.to_command();
        if let Some(log_path) = self.log_file(invocation.run_number) {
            let stdout = File::create(&log_path)
                .map_err(|e| ExecutorError::LogFileError(log_path.clone(), e))?;
            let stderr = stdout
                .try_clone()
                .map_err(|e| ExecutorError::LogFileError(log_path.clone(), e))?;
            command.stdout(stdout).stderr(stderr);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ExecutorError::SpawnError(invocation.program.clone(), e))?;
        log::debug!(
            "Spawned {} for run {} with pid {}",
            invocation.program.display(),
            invocation.run_number,
            child.id()
        );
        let status = child
            .wait()
            .map_err(|e| ExecutorError::WaitError(invocation.program.clone(), e))?;

        Ok(match status.code() {
            Some(0) => RunOutcome::Success,
            Some(code) => RunOutcome::ExitCode(code),
            None => RunOutcome::Terminated,
        })
    }
}

/// Logs invocations instead of running them
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl Executor for DryRunExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError> {
        log::info!("[dry run] {invocation}");
        Ok(RunOutcome::DryRun)
    }
}
