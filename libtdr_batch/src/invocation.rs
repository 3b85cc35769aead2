use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use super::config::Config;
use super::error::{ConfigError, InvocationError};
use super::input_pattern::expand_input_pattern;

const INPUT_FLAG: &str = "-i";
const OUTPUT_FLAG: &str = "-o";
const CALIBRATION_FLAG: &str = "-c";

/// A single, fully resolved call of the converter for one run.
///
/// Arguments are kept as a vector and never joined into a shell string, so paths
/// with spaces or glob characters reach the converter untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub run_number: i32,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_directory: Option<PathBuf>,
    pub input_files: Vec<PathBuf>,
    pub output_file: PathBuf,
}

impl Invocation {
    /// Total size of the input files in bytes; unreadable files count as 0
    pub fn input_size_bytes(&self) -> u64 {
        self.input_files
            .iter()
            .filter_map(|path| path.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }

    /// Make the std Command for this invocation
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in self.args.iter() {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Builds the converter invocation of each run from the Config.
///
/// Everything that does not depend on the run is resolved once up front.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    config: Config,
    binary: PathBuf,
    calibration: Option<PathBuf>,
    working_directory: Option<PathBuf>,
}

impl InvocationBuilder {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            config: config.clone(),
            binary: config.get_binary()?,
            calibration: config.get_calibration_file()?,
            working_directory: config.get_working_directory()?,
        })
    }

    /// Build the invocation for a run
    ///
    /// Returns None if no input file matches the run's pattern.
    pub fn build(&self, run_number: i32) -> Result<Option<Invocation>, InvocationError> {
        let input_glob = self.config.get_input_glob(run_number)?;
        let input_files = expand_input_pattern(&input_glob)?;
        if input_files.is_empty() {
            log::debug!("Nothing matches {input_glob} for run {run_number}");
            return Ok(None);
        }
        let output_file = self.config.get_output_file_name(run_number)?;

        let mut converter_args: Vec<OsString> = Vec::with_capacity(input_files.len() + 6);
        converter_args.push(INPUT_FLAG.into());
        converter_args.extend(input_files.iter().map(OsString::from));
        converter_args.push(OUTPUT_FLAG.into());
        converter_args.push(output_file.clone().into());
        if let Some(cal) = &self.calibration {
            converter_args.push(CALIBRATION_FLAG.into());
            converter_args.push(cal.clone().into());
        }
        converter_args.extend(self.config.extra_args.iter().map(OsString::from));

        let (program, args) = match &self.config.terminal {
            Some(terminal) => {
                let mut args: Vec<OsString> =
                    terminal.args.iter().map(OsString::from).collect();
                args.push(self.binary.clone().into());
                args.extend(converter_args);
                (terminal.program.clone(), args)
            }
            None => (self.binary.clone(), converter_args),
        };

        Ok(Some(Invocation {
            run_number,
            program,
            args,
            working_directory: self.working_directory.clone(),
            input_files,
            output_file,
        }))
    }
}
