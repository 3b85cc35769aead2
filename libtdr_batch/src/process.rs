use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;

use super::config::Config;
use super::error::ProcessorError;
use super::executor::{Executor, RunOutcome};
use super::invocation::InvocationBuilder;
use super::run_selection::create_subsets;
use super::worker_status::{RunState, WorkerStatus};

/// Tally of a batch (or of one worker's share of it)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: Vec<i32>,
    pub failed: Vec<i32>,
    pub skipped: Vec<i32>,
    /// Runs a dry run would have converted
    pub planned: Vec<i32>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len() + self.skipped.len() + self.planned.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    fn record(&mut self, run_number: i32, state: RunState) {
        match state {
            RunState::Finished => self.converted.push(run_number),
            RunState::Failed => self.failed.push(run_number),
            RunState::Skipped => self.skipped.push(run_number),
            RunState::Planned => self.planned.push(run_number),
            RunState::Started => (),
        }
    }

    fn merge(&mut self, other: BatchSummary) {
        self.converted.extend(other.converted);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
        self.planned.extend(other.planned);
    }
}

/// Convert a single run.
///
/// Problems with the run itself (no inputs, converter failure) are logged and reported
/// through the returned state. Only a broken status channel is an error.
pub fn process_run(
    builder: &InvocationBuilder,
    executor: &dyn Executor,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
    progress: f32,
) -> Result<RunState, ProcessorError> {
    tx.send(WorkerStatus::new(
        progress,
        run_number,
        worker_id,
        RunState::Started,
    ))?;

    let state = match builder.build(run_number) {
        Ok(Some(invocation)) => {
            log::info!(
                "Converting run {run_number} ({} in {} files)...",
                human_bytes::human_bytes(invocation.input_size_bytes() as f64),
                invocation.input_files.len()
            );
            log::debug!("{invocation}");
            match executor.execute(&invocation) {
                Ok(RunOutcome::DryRun) => {
                    log::info!(
                        "Run {run_number} would be converted to {}",
                        invocation.output_file.display()
                    );
                    RunState::Planned
                }
                Ok(outcome) if outcome.is_success() => {
                    log::info!(
                        "Run {run_number} converted to {}",
                        invocation.output_file.display()
                    );
                    RunState::Finished
                }
                Ok(outcome) => {
                    log::warn!("Converter for run {run_number} ended with {outcome}");
                    RunState::Failed
                }
                Err(e) => {
                    log::error!("Could not run converter for run {run_number}: {e}");
                    RunState::Failed
                }
            }
        }
        Ok(None) => {
            log::warn!("No input files found for run {run_number}, skipping...");
            RunState::Skipped
        }
        Err(e) => {
            log::error!("Could not prepare run {run_number}: {e}");
            RunState::Failed
        }
    };

    Ok(state)
}

/// Process a subset of runs, one after the other
pub fn process_subset(
    builder: InvocationBuilder,
    executor: Arc<dyn Executor>,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<BatchSummary, ProcessorError> {
    let mut summary = BatchSummary::default();
    let n_runs = subset.len() as f32;
    for (idx, run) in subset.into_iter().enumerate() {
        let state = process_run(
            &builder,
            executor.as_ref(),
            run,
            &tx,
            worker_id,
            idx as f32 / n_runs,
        )?;
        summary.record(run, state);
        tx.send(WorkerStatus::new(
            (idx + 1) as f32 / n_runs,
            run,
            worker_id,
            state,
        ))?;
    }
    Ok(summary)
}

/// A running batch: one thread per non-empty subset of runs.
#[derive(Debug)]
pub struct Batch {
    workers: Vec<JoinHandle<Result<BatchSummary, ProcessorError>>>,
    subset_sizes: Vec<usize>,
}

impl Batch {
    /// Divide the configured runs among the workers and start them
    pub fn start(
        config: &Config,
        executor: Arc<dyn Executor>,
        tx: Sender<WorkerStatus>,
    ) -> Result<Self, ProcessorError> {
        let builder = InvocationBuilder::new(config)?;
        let runs = config.runs.runs();
        for run in config.runs.duplicates() {
            log::warn!("Run {run} is listed more than once, it will only be converted once");
        }
        let n_workers = config.get_n_workers();
        log::info!(
            "Converting {} runs with {} workers",
            runs.len(),
            n_workers.min(runs.len())
        );

        let mut workers = Vec::new();
        let mut subset_sizes = Vec::new();
        // Dont make empty workers
        for subset in create_subsets(&runs, n_workers)
            .into_iter()
            .filter(|s| !s.is_empty())
        {
            let worker_id = workers.len();
            let builder = builder.clone();
            let executor = executor.clone();
            let tx = tx.clone();
            subset_sizes.push(subset.len());
            log::debug!("Worker {worker_id} gets runs {subset:?}");
            workers.push(std::thread::spawn(move || {
                process_subset(builder, executor, tx, worker_id, subset)
            }));
        }

        Ok(Self {
            workers,
            subset_sizes,
        })
    }

    pub fn n_workers(&self) -> usize {
        self.workers.len()
    }

    /// Number of runs given to each worker, by worker id
    pub fn subset_sizes(&self) -> &[usize] {
        &self.subset_sizes
    }

    /// Check if there are any workers still doing stuff
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|worker| worker.is_finished())
    }

    /// Block until every worker is done and combine their results
    ///
    /// All workers are joined even if one of them failed; the first failure is returned.
    pub fn join(self) -> Result<BatchSummary, ProcessorError> {
        let mut summary = BatchSummary::default();
        let mut first_error: Option<ProcessorError> = None;
        for (worker_id, worker) in self.workers.into_iter().enumerate() {
            let result = match worker.join() {
                Ok(result) => result,
                Err(_) => Err(ProcessorError::JoinError(worker_id)),
            };
            match result {
                Ok(worker_summary) => {
                    log::debug!("Worker {worker_id} complete");
                    summary.merge(worker_summary);
                }
                Err(e) => {
                    log::error!("Worker {worker_id} failed: {e}");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

/// Convert every configured run and wait for the batch to finish
pub fn process(
    config: &Config,
    executor: Arc<dyn Executor>,
    tx: Sender<WorkerStatus>,
) -> Result<BatchSummary, ProcessorError> {
    Batch::start(config, executor, tx)?.join()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::executor::{DryRunExecutor, ProcessExecutor};
    use crate::invocation::Invocation;
    use crate::run_selection::RunSelection;
    use std::fs::File;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc;
    use std::sync::Mutex;

    /// Records which runs were executed, failing the ones it is told to
    #[derive(Default)]
    struct RecordingExecutor {
        executed: Mutex<Vec<i32>>,
        failing: Vec<i32>,
    }

    impl Executor for RecordingExecutor {
        fn execute(&self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError> {
            self.executed.lock().unwrap().push(invocation.run_number);
            if self.failing.contains(&invocation.run_number) {
                Ok(RunOutcome::ExitCode(1))
            } else {
                Ok(RunOutcome::Success)
            }
        }
    }

    fn setup(dir: &Path, runs: &[i32]) -> Config {
        let data = dir.join("data");
        std::fs::create_dir_all(&data).unwrap();
        for run in runs {
            File::create(data.join(format!("R{run}_0"))).unwrap();
        }
        Config {
            binary_path: PathBuf::from("/opt/tdr/TDR2tree"),
            input_pattern: format!("{}/R{{run}}_*", data.display()),
            output_path: dir.to_path_buf(),
            output_name: String::from("R{run}.root"),
            runs: RunSelection::List(runs.to_vec()),
            n_threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn every_run_executed_once_for_any_pool_size() {
        let dir = tempfile::tempdir().unwrap();
        let runs: Vec<i32> = (84..131).collect();
        let mut config = setup(dir.path(), &runs);
        for n_threads in [1, 2, 3, 8, 64] {
            config.n_threads = n_threads;
            let executor = Arc::new(RecordingExecutor::default());
            let (tx, _rx) = mpsc::channel();
            let summary = process(&config, executor.clone(), tx).unwrap();
            let mut executed = executor.executed.lock().unwrap().clone();
            executed.sort();
            assert_eq!(executed, runs);
            assert_eq!(summary.converted.len(), runs.len());
            assert_eq!(summary.total(), runs.len());
        }
    }

    #[test]
    fn failures_and_missing_inputs_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &[18, 19, 20, 21]);
        config.runs = RunSelection::List(vec![18, 19, 20, 21, 22]);
        let executor = Arc::new(RecordingExecutor {
            executed: Mutex::new(vec![]),
            failing: vec![19],
        });
        let (tx, _rx) = mpsc::channel();
        let mut summary = process(&config, executor.clone(), tx).unwrap();
        summary.converted.sort();
        assert_eq!(summary.converted, vec![18, 20, 21]);
        assert_eq!(summary.failed, vec![19]);
        assert_eq!(summary.skipped, vec![22]);
        assert!(summary.has_failures());
        assert_eq!(executor.executed.lock().unwrap().len(), 4);
    }

    #[test]
    fn workers_report_progress() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &[1, 2, 3]);
        let (tx, rx) = mpsc::channel();
        let batch = Batch::start(&config, Arc::new(RecordingExecutor::default()), tx).unwrap();
        assert_eq!(batch.n_workers(), 2);
        assert_eq!(batch.subset_sizes(), &[2, 1]);
        batch.join().unwrap();

        let statuses: Vec<WorkerStatus> = rx.iter().collect();
        // a start and an end message per run
        assert_eq!(statuses.len(), 6);
        for worker_id in 0..2 {
            let last = statuses
                .iter()
                .filter(|s| s.worker_id == worker_id)
                .last()
                .unwrap();
            assert_eq!(last.progress, 1.0);
            assert_eq!(last.state, RunState::Finished);
        }
    }

    #[test]
    fn dry_run_plans_runs_without_converting() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &[18, 19]);
        config.runs = RunSelection::List(vec![18, 19, 20]);
        let (tx, rx) = mpsc::channel();
        let mut summary = process(&config, Arc::new(DryRunExecutor), tx).unwrap();
        summary.planned.sort();
        assert_eq!(summary.planned, vec![18, 19]);
        assert_eq!(summary.skipped, vec![20]);
        assert!(summary.converted.is_empty());
        assert!(!summary.has_failures());
        assert_eq!(summary.total(), 3);
        assert!(rx.iter().all(|s| s.state != RunState::Finished));
        assert!(!dir.path().join("R18.root").exists());
    }

    #[test]
    fn duplicated_runs_are_converted_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &[18, 19]);
        config.runs = RunSelection::List(vec![18, 19, 18, 18]);
        let executor = Arc::new(RecordingExecutor::default());
        let (tx, _rx) = mpsc::channel();
        let summary = process(&config, executor.clone(), tx).unwrap();
        let mut executed = executor.executed.lock().unwrap().clone();
        executed.sort();
        assert_eq!(executed, vec![18, 19]);
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn no_workers_for_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &[]);
        config.runs = RunSelection::Range { first: 5, last: 1 };
        let (tx, _rx) = mpsc::channel();
        let batch = Batch::start(&config, Arc::new(RecordingExecutor::default()), tx).unwrap();
        assert_eq!(batch.n_workers(), 0);
        assert!(batch.is_finished());
        assert_eq!(batch.join().unwrap(), BatchSummary::default());
    }

    #[test]
    fn closed_status_channel_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &[1, 2]);
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(matches!(
            process(&config, Arc::new(RecordingExecutor::default()), tx),
            Err(ProcessorError::SendError(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn converts_with_real_processes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &[18, 19, 20]);
        // Stand-in converter: touch whatever follows -o
        let script = dir.path().join("fake_converter.sh");
        std::fs::write(
            &script,
            "shift\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-o\" ]; then touch \"$2\"; fi\n  shift\ndone\n",
        )
        .unwrap();
        config.terminal = Some(crate::config::TerminalConfig {
            program: PathBuf::from("/bin/sh"),
            args: vec![script.to_string_lossy().to_string()],
        });
        let (tx, _rx) = mpsc::channel();
        let summary = process(&config, Arc::new(ProcessExecutor::default()), tx).unwrap();
        assert_eq!(summary.converted.len(), 3);
        for run in [18, 19, 20] {
            assert!(dir.path().join(format!("R{run}.root")).exists());
        }
    }
}
