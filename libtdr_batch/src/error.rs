use std::path::PathBuf;
use thiserror::Error;

use super::config::RUN_PLACEHOLDER;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config field {0} ({1:?}) does not contain the run placeholder {ph}", ph=RUN_PLACEHOLDER)]
    MissingRunPlaceholder(&'static str, String),
    #[error("Output directory {0:?} does not exist")]
    MissingOutputDirectory(PathBuf),
    #[error("Calibration file {0:?} does not exist")]
    MissingCalibrationFile(PathBuf),
    #[error("Converter log directory {0:?} does not exist")]
    MissingLogDirectory(PathBuf),
    #[error("Config binary_path is empty")]
    EmptyBinaryPath,
    #[error("Config has a bad input pattern: {0}")]
    BadInputPattern(#[from] PatternError),
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Input pattern {0:?} has wildcards outside of the file name, which is not supported")]
    WildcardInDirectory(String),
    #[error("Input pattern {0:?} has no file name component")]
    NoFileName(String),
    #[error("Input pattern {0:?} has an unterminated character class")]
    UnterminatedClass(String),
    #[error("Could not read input directory {0:?}: {1}")]
    BadDirectory(PathBuf, std::io::Error),
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Invocation failed due to input pattern error: {0}")]
    PatternError(#[from] PatternError),
    #[error("Invocation failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to spawn {0:?}: {1}")]
    SpawnError(PathBuf, std::io::Error),
    #[error("Failed waiting on {0:?}: {1}")]
    WaitError(PathBuf, std::io::Error),
    #[error("Could not open converter log file {0:?}: {1}")]
    LogFileError(PathBuf, std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed to join worker {0}")]
    JoinError(usize),
}
