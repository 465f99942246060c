use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;

use super::error::PoolError;
use super::worker_status::{PoolStage, WorkerStatus};

/// A fixed-size pool of OS threads used for the per-channel fan-outs.
///
/// Each call to [`WorkerPool::run`] is a join barrier: it returns only once every task
/// has finished. Tasks only share read-only inputs; each task's result lives in the
/// worker that produced it until the barrier. The single piece of shared mutable state
/// is the completion counter, which is used for progress reporting only.
#[derive(Debug)]
pub struct WorkerPool {
    n_workers: usize,
    completed: AtomicUsize,
    tx: Option<Sender<WorkerStatus>>,
}

impl WorkerPool {
    pub fn new(n_workers: usize, tx: Option<Sender<WorkerStatus>>) -> Self {
        Self {
            n_workers: n_workers.max(1),
            completed: AtomicUsize::new(0),
            tx,
        }
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Number of tasks completed in the most recent fan-out
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Run `task` over every input and return the results in input order.
    ///
    /// Completion order across workers is unspecified; the returned vector is rebuilt
    /// from each input's enumeration index.
    pub fn run<T, R, F>(
        &self,
        stage: PoolStage,
        inputs: Vec<T>,
        task: F,
    ) -> Result<Vec<R>, PoolError>
    where
        T: Send,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        let total = inputs.len();
        self.completed.store(0, Ordering::SeqCst);
        if total == 0 {
            return Ok(Vec::new());
        }

        let subsets = create_subsets(inputs, self.n_workers);
        let task = &task;
        let completed = &self.completed;

        let mut indexed: Vec<(usize, R)> = Vec::with_capacity(total);
        std::thread::scope(|scope| -> Result<(), PoolError> {
            let mut handles = Vec::new();
            for (worker_id, subset) in subsets.into_iter().enumerate() {
                // Dont make empty workers
                if subset.is_empty() {
                    continue;
                }
                let tx = self.tx.clone();
                handles.push((
                    worker_id,
                    scope.spawn(move || {
                        let mut results = Vec::with_capacity(subset.len());
                        for (idx, input) in subset {
                            results.push((idx, task(&input)));
                            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                            if let Some(tx) = &tx {
                                let status = WorkerStatus::new(done, total, worker_id, stage);
                                if tx.send(status).is_err() {
                                    spdlog::debug!("Progress receiver hung up");
                                }
                            }
                        }
                        results
                    }),
                ));
            }
            // Join every worker before reporting, the scope panics on unjoined panicked threads
            let mut panicked: Option<usize> = None;
            for (worker_id, handle) in handles {
                match handle.join() {
                    Ok(results) => indexed.extend(results),
                    Err(_) => {
                        spdlog::error!("Worker {worker_id} panicked during {stage}");
                        panicked.get_or_insert(worker_id);
                    }
                }
            }
            match panicked {
                Some(worker_id) => Err(PoolError::WorkerPanic(worker_id, stage.to_string())),
                None => Ok(()),
            }
        })?;

        indexed.sort_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, result)| result).collect())
    }
}

/// Divide the inputs into a set of subsets (per worker), round-robin, tagging each input
/// with its position
pub fn create_subsets<T>(inputs: Vec<T>, n_workers: usize) -> Vec<Vec<(usize, T)>> {
    let mut subsets: Vec<Vec<(usize, T)>> = (0..n_workers.max(1)).map(|_| Vec::new()).collect();
    let n_subsets = subsets.len();

    for (idx, input) in inputs.into_iter().enumerate() {
        subsets[idx % n_subsets].push((idx, input))
    }

    subsets
}
