//! # tdr_batch
//!
//! tdr_batch runs the TDR2tree converter over many runs of TDR data at once. Each run of
//! the data acquisition is written as a set of files (`R23_0`, `R23_1`, ...); for every
//! run the converter is called once with all of that run's files, producing one ROOT
//! file per run. Runs are divided among a pool of worker threads, so several
//! conversions happen in parallel.
//!
//! The converter itself is not part of this repository. It is invoked as
//!
//! ```text
//! TDR2tree -i <input files...> -o <output file> [-c <calibration file>] [extra args...]
//! ```
//!
//! and its exit status is only logged: a failed run never stops the others.
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./tdr_batch_cli` from the top
//! level repository. See the `tdr_batch_cli` docs for usage.
//!
//! ## Configuration
//!
//! Everything about a batch lives in a YAML file:
//!
//! ```yml
//! binary_path: ../building/TDR2tree
//! input_pattern: /Volumes/PR271/PR271A/R{run}_*
//! output_path: .
//! output_name: R{run}.root
//! calibration_path: ../cal_basic.txt
//! extra_args: []
//! working_directory: null
//! terminal:
//!   program: xterm
//!   args: [-geometry, 150x25+5-60, -e]
//! converter_log_path: null
//! runs: [18, 19, 20, 21]
//! n_threads: 2
//! ```
//!
//! - `binary_path`: The converter. A bare name is looked up on the PATH.
//! - `input_pattern`: Where a run's files are. `{run}` is replaced by the run number and
//! the file name may use `*`, `?` and `[...]` wildcards. Runs with no matching file are
//! skipped. The directory part is taken literally and must not contain `*`, `?` or `[`;
//! there is no escape for these, so a directory such as `PR271[A]` has to be renamed or
//! linked under a plain name.
//! - `output_path`: Directory the output files are written to. Must exist.
//! - `output_name`: Output file name, `{run}` is replaced by the run number.
//! - `calibration_path` (Optional): Calibration file passed with `-c`.
//! - `extra_args` (Optional): Flags appended to every call, e.g. `-ab` for addback.
//! - `working_directory` (Optional): Directory the converter runs in. Relative paths in
//! the config are relative to it.
//! - `terminal` (Optional): Open each conversion in a terminal window. The converter
//! command is appended to `args`. The exit status seen is the terminal's, not the
//! converter's: xterm exits with 0 whatever the converter did, so failed conversions
//! are counted as converted.
//! - `converter_log_path` (Optional): Write each run's converter output to
//! `run_<number>.log` in this directory instead of the terminal. With `terminal` set
//! the log holds the terminal program's own output; the converter still writes into
//! its window.
//! - `runs`: Either a list of run numbers or an inclusive range, `{ first: 84, last: 130 }`.
//! - `n_threads`: Number of workers. 0 uses one worker per logical CPU. If there are fewer
//! runs than workers, only the workers that would do work are created.
//!
//! Ready made configurations for the PR271 experiment are in `configs/`.
pub mod config;
pub mod error;
pub mod executor;
pub mod input_pattern;
pub mod invocation;
pub mod process;
pub mod run_selection;
pub mod worker_status;
