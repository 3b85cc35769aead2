//! # tdr_batch_cli
//!
//! Part of the tdr_batch crate family.
//!
//! Command line application that runs the TDR2tree converter over a batch of runs.
//!
//! ## Install
//!
//! Use `cargo install --path ./tdr_batch_cli`
//!
//! ## Use
//!
//! Make a template configuration and edit it:
//!
//! ```bash
//! tdr_batch_cli -p config.yml new
//! ```
//!
//! Then run the batch:
//!
//! ```bash
//! tdr_batch_cli -p config.yml
//! ```
//!
//! `-n <threads>` overrides the number of workers in the config, `--dry-run` only
//! prints the converter calls and `-v` turns on debug logging. The exit code is nonzero
//! if the configuration is bad or any run failed to convert.
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use libtdr_batch::config::Config;
use libtdr_batch::executor::{DryRunExecutor, Executor, ProcessExecutor};
use libtdr_batch::process::{Batch, BatchSummary};
use libtdr_batch::worker_status::{RunState, WorkerStatus};

const BAR_TEMPLATE: &str = "{prefix:>9} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

fn cli() -> Command {
    Command::new("tdr_batch_cli")
        .about("Run TDR2tree over a batch of runs in parallel")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("threads")
                .short('n')
                .long("threads")
                .value_parser(value_parser!(usize))
                .help("Number of workers, overrides the configuration (0 = all cores)"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the converter calls without running them"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Debug level logging"),
        )
}

fn make_template_config(path: &Path) -> ExitCode {
    log::info!("Making a template config at {}...", path.display());
    match Config::default().write_config_file(path) {
        Ok(()) => {
            log::info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Could not write template config: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path, matches: &ArgMatches) -> Option<Config> {
    log::info!("Loading config from {}...", path.display());
    let mut config = match Config::read_config_file(path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return None;
        }
    };
    if let Some(n_threads) = matches.get_one::<usize>("threads") {
        config.n_threads = *n_threads;
    }
    if let Err(e) = config.validate() {
        log::error!("{e}");
        return None;
    }

    log::info!("Config successfully loaded.");
    log::info!("Converter: {}", config.binary_path.display());
    log::info!("Input Pattern: {}", config.input_pattern);
    log::info!(
        "Output: {}",
        config.output_path.join(&config.output_name).display()
    );
    if let Some(cal) = &config.calibration_path {
        log::info!("Calibration: {}", cal.display());
    }
    if let Some(terminal) = &config.terminal {
        log::info!("Terminal: {}", terminal.program.display());
    }
    log::info!("Runs: {}", config.runs.len());
    log::info!("Workers: {}", config.get_n_workers());
    Some(config)
}

fn update_bar(bar: &ProgressBar, status: &WorkerStatus) {
    let len = bar.length().unwrap_or(0) as f32;
    bar.set_position((status.progress * len).round() as u64);
    let msg = match status.state {
        RunState::Started => "converting",
        RunState::Finished => "finished",
        RunState::Failed => "failed",
        RunState::Skipped => "skipped",
        RunState::Planned => "planned",
    };
    bar.set_message(format!("{msg} run {}", status.run_number));
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    // Initialize feedback
    let level = if matches.get_flag("verbose") {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return ExitCode::FAILURE;
    }
    log::set_max_level(level);

    // Parse the cli
    let config_path = match matches.get_one::<PathBuf>("path") {
        Some(p) => p.clone(),
        None => {
            log::error!("A configuration path is required");
            return ExitCode::FAILURE;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        return make_template_config(&config_path);
    }

    let Some(config) = load_config(&config_path, &matches) else {
        return ExitCode::FAILURE;
    };

    let executor: Arc<dyn Executor> = if matches.get_flag("dry-run") {
        log::info!("Dry run, nothing will be converted.");
        Arc::new(DryRunExecutor)
    } else {
        match config.get_converter_log_directory() {
            Ok(log_dir) => Arc::new(ProcessExecutor::new(log_dir)),
            Err(e) => {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    };

    // Spawn the workers!
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let batch = match Batch::start(&config, executor, tx) {
        Ok(b) => b,
        Err(e) => {
            log::error!("Could not start workers: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Setup the progress bars
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    let bars: Vec<ProgressBar> = batch
        .subset_sizes()
        .iter()
        .enumerate()
        .map(|(worker_id, size)| {
            let bar = pb_manager.add(ProgressBar::new(*size as u64));
            bar.set_style(style.clone());
            bar.set_prefix(format!("Worker {worker_id}"));
            bar
        })
        .collect();

    // The channel disconnects once every worker has dropped its sender
    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(status) => match bars.get(status.worker_id) {
                Some(bar) => update_bar(bar, &status),
                None => log::error!("Status from unknown worker {}", status.worker_id),
            },
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for bar in bars.iter() {
        bar.finish();
    }

    let summary = match batch.join() {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Batch failed with error: {e}");
            return ExitCode::FAILURE;
        }
    };

    report(&summary)
}

/// Log the end-of-batch summary and pick the exit code
///
/// Skipped runs are only warned about; any failed run makes the batch a failure.
fn report(summary: &BatchSummary) -> ExitCode {
    if summary.planned.is_empty() {
        log::info!(
            "Converted {} runs, {} failed, {} skipped.",
            summary.converted.len(),
            summary.failed.len(),
            summary.skipped.len()
        );
    } else {
        log::info!(
            "Dry run: {} runs would be converted, {} skipped.",
            summary.planned.len(),
            summary.skipped.len()
        );
    }
    if !summary.skipped.is_empty() {
        log::warn!("Skipped runs (no input files): {:?}", summary.skipped);
    }
    if summary.has_failures() {
        log::error!("Failed runs: {:?}", summary.failed);
        return ExitCode::FAILURE;
    }

    log::info!("Done.");
    ExitCode::SUCCESS
}
