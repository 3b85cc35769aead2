/// What a worker is doing with its current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Started,
    Finished,
    Failed,
    Skipped,
    /// Would have been converted, but this is a dry run
    Planned,
}

/// Status message sent from a worker to whoever is watching the batch
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    /// Fraction of this worker's runs that are done
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub state: RunState,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, state: RunState) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            state,
        }
    }
}
