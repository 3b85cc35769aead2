use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::input_pattern::split_pattern;
use super::run_selection::RunSelection;

/// Placeholder replaced by the run number in the input pattern and output name
pub const RUN_PLACEHOLDER: &str = "{run}";

/// A terminal emulator to wrap each conversion in, so that its output can be watched live.
///
/// The converter and its arguments are appended after `args`, so the last argument
/// should be the terminal's "execute" flag (`-e` for xterm).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("xterm"),
            args: vec![
                String::from("-geometry"),
                String::from("150x25+5-60"),
                String::from("-e"),
            ],
        }
    }
}

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub binary_path: PathBuf,
    pub input_pattern: String,
    pub output_path: PathBuf,
    pub output_name: String,
    #[serde(default)]
    pub calibration_path: Option<PathBuf>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Wrapper program the converter runs inside. Its exit status replaces the converter's.
    #[serde(default)]
    pub terminal: Option<TerminalConfig>,
    /// Directory for per-run converter output. None leaves it on the terminal.
    /// With a terminal wrapper this captures the wrapper's output instead.
    #[serde(default)]
    pub converter_log_path: Option<PathBuf>,
    pub runs: RunSelection,
    /// Number of workers. 0 means one per logical CPU.
    #[serde(default)]
    pub n_threads: usize,
}

impl Default for Config {
    /// Generate a new Config object with placeholder paths
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("TDR2tree"),
            input_pattern: format!("/path/to/data/R{RUN_PLACEHOLDER}_*"),
            output_path: PathBuf::from("."),
            output_name: format!("R{RUN_PLACEHOLDER}.root"),
            calibration_path: None,
            extra_args: vec![],
            working_directory: None,
            terminal: None,
            converter_log_path: None,
            runs: RunSelection::default(),
            n_threads: 0,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check everything that would otherwise fail identically for every run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBinaryPath);
        }
        if !self.input_pattern.contains(RUN_PLACEHOLDER) {
            return Err(ConfigError::MissingRunPlaceholder(
                "input_pattern",
                self.input_pattern.clone(),
            ));
        }
        if !self.output_name.contains(RUN_PLACEHOLDER) {
            return Err(ConfigError::MissingRunPlaceholder(
                "output_name",
                self.output_name.clone(),
            ));
        }
        split_pattern(&self.get_input_glob(0)?)?;

        let output_dir = self.resolve_path(&self.output_path)?;
        if !output_dir.exists() {
            return Err(ConfigError::MissingOutputDirectory(output_dir));
        }
        if let Some(cal) = &self.calibration_path {
            let cal = self.resolve_path(cal)?;
            if !cal.exists() {
                return Err(ConfigError::MissingCalibrationFile(cal));
            }
        }
        if let Some(log_dir) = self.get_converter_log_directory()? {
            if !log_dir.exists() {
                return Err(ConfigError::MissingLogDirectory(log_dir));
            }
        }
        Ok(())
    }

    /// Get the input file pattern for a run, relative paths resolved
    pub fn get_input_glob(&self, run_number: i32) -> Result<String, ConfigError> {
        let pattern = self.input_pattern.replace(RUN_PLACEHOLDER, &run_number.to_string());
        Ok(self
            .resolve_path(Path::new(&pattern))?
            .to_string_lossy()
            .to_string())
    }

    /// Get the path to the output file of a run
    pub fn get_output_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let name = self.output_name.replace(RUN_PLACEHOLDER, &run_number.to_string());
        Ok(self.resolve_path(&self.output_path)?.join(name))
    }

    /// Get the calibration file, if one is used
    pub fn get_calibration_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.calibration_path {
            Some(cal) => Ok(Some(self.resolve_path(cal)?)),
            None => Ok(None),
        }
    }

    /// Get the directory converter output is written to, if any
    pub fn get_converter_log_directory(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.converter_log_path {
            Some(dir) => Ok(Some(self.resolve_path(dir)?)),
            None => Ok(None),
        }
    }

    /// Get the converter executable
    ///
    /// A bare name (no directory) is left alone so that it is looked up on the PATH.
    pub fn get_binary(&self) -> Result<PathBuf, ConfigError> {
        if self.binary_path.components().count() == 1 && self.binary_path.is_relative() {
            return Ok(self.binary_path.clone());
        }
        self.resolve_path(&self.binary_path)
    }

    /// Get the working directory the converter runs in, made absolute
    pub fn get_working_directory(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.working_directory {
            Some(dir) if dir.is_absolute() => Ok(Some(dir.clone())),
            Some(dir) => Ok(Some(std::env::current_dir()?.join(dir))),
            None => Ok(None),
        }
    }

    /// Resolve a configured path the same way the converter will see it
    ///
    /// Relative paths are relative to the working directory when one is set, and to
    /// the current directory otherwise. The result is absolute so that it does not
    /// depend on which process interprets it.
    pub fn resolve_path(&self, path: &Path) -> Result<PathBuf, ConfigError> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        match self.get_working_directory()? {
            Some(dir) => Ok(dir.join(path)),
            None => Ok(std::env::current_dir()?.join(path)),
        }
    }

    /// Number of workers to use; resolves 0 to the logical CPU count
    pub fn get_n_workers(&self) -> usize {
        if self.n_threads > 0 {
            return self.n_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn has_calibration(&self) -> bool {
        self.calibration_path.is_some()
    }

    pub fn use_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        Config {
            binary_path: PathBuf::from("/opt/tdr/TDR2tree"),
            input_pattern: String::from("/Volumes/PR271/PR271A/R{run}_*"),
            output_path: dir.to_path_buf(),
            output_name: String::from("R{run}.root"),
            runs: RunSelection::List(vec![18, 19]),
            n_threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn input_glob_embeds_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        for run in config.runs.runs() {
            assert_eq!(
                config.get_input_glob(run).unwrap(),
                format!("/Volumes/PR271/PR271A/R{run}_*")
            );
        }
    }

    #[test]
    fn output_name_embeds_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        assert_eq!(
            config.get_output_file_name(23).unwrap(),
            dir.path().join("R23.root")
        );
        config.output_name = String::from("r{run}time.root");
        assert_eq!(
            config.get_output_file_name(84).unwrap(),
            dir.path().join("r84time.root")
        );
    }

    #[test]
    fn relative_paths_follow_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.working_directory = Some(dir.path().join("building"));
        config.output_path = PathBuf::from("../output_files");
        config.binary_path = PathBuf::from("./TDR2tree");
        assert_eq!(
            config.get_output_file_name(84).unwrap(),
            dir.path().join("building/../output_files/R84.root")
        );
        assert_eq!(
            config.get_binary().unwrap(),
            dir.path().join("building/./TDR2tree")
        );
    }

    #[test]
    fn bare_binary_name_is_left_for_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.binary_path = PathBuf::from("TDR2tree");
        assert_eq!(config.get_binary().unwrap(), PathBuf::from("TDR2tree"));
    }

    #[test]
    fn validate_requires_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        assert!(config.validate().is_ok());
        config.output_name = String::from("out.root");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRunPlaceholder("output_name", _))
        ));
        config.output_name = String::from("R{run}.root");
        config.input_pattern = String::from("/data/R18_*");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRunPlaceholder("input_pattern", _))
        ));
    }

    #[test]
    fn validate_checks_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.calibration_path = Some(dir.path().join("cal_basic.txt"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCalibrationFile(_))
        ));
        std::fs::write(dir.path().join("cal_basic.txt"), "").unwrap();
        assert!(config.validate().is_ok());

        config.output_path = dir.path().join("missing");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOutputDirectory(_))
        ));

        config.output_path = dir.path().to_path_buf();
        config.converter_log_path = Some(dir.path().join("logs"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingLogDirectory(_))
        ));
    }

    #[test]
    fn validate_rejects_wildcard_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.input_pattern = String::from("/Volumes/PR*/R{run}_*");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadInputPattern(_))
        ));
    }

    #[test]
    fn zero_threads_means_all_cores() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        assert_eq!(config.get_n_workers(), 2);
        config.n_threads = 0;
        assert!(config.get_n_workers() >= 1);
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.terminal = Some(TerminalConfig::default());
        config.extra_args = vec![String::from("-ab")];
        let path = dir.path().join("config.yml");
        config.write_config_file(&path).unwrap();
        let read = Config::read_config_file(&path).unwrap();
        assert_eq!(read.runs, config.runs);
        assert_eq!(read.terminal, config.terminal);
        assert_eq!(read.extra_args, config.extra_args);
        assert_eq!(read.output_name, config.output_name);
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::read_config_file(&dir.path().join("nope.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }

    #[test]
    fn bundled_presets_parse() {
        let cal_basic: Config =
            serde_yaml::from_str(include_str!("../../configs/pr271a_cal_basic.yml")).unwrap();
        let runs = cal_basic.runs.runs();
        assert_eq!(runs.len(), 56);
        assert!(!runs.contains(&39));
        assert!(!runs.contains(&48));
        assert_eq!(cal_basic.n_threads, 2);
        assert_eq!(cal_basic.terminal, Some(TerminalConfig::default()));
        assert!(cal_basic.has_calibration());

        let timecal: Config =
            serde_yaml::from_str(include_str!("../../configs/pr271a_timecal.yml")).unwrap();
        assert_eq!(timecal.runs.runs(), (84..=130).collect::<Vec<i32>>());
        assert_eq!(timecal.n_threads, 0);
        assert!(!timecal.use_terminal());
        assert!(!timecal.has_calibration());
    }

    #[test]
    fn optional_fields_default() {
        let yaml = "binary_path: ./TDR2tree\n\
                    input_pattern: ../../PR271A/R{run}_*\n\
                    output_path: ../output_files\n\
                    output_name: r{run}time.root\n\
                    runs: { first: 84, last: 130 }\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.n_threads, 0);
        assert!(config.calibration_path.is_none());
        assert!(config.terminal.is_none());
        assert!(config.extra_args.is_empty());
        assert_eq!(config.runs.len(), 47);
    }
}
