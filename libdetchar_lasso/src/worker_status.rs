/// Which fan-out a status message belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PoolStage {
    #[default]
    Analysis,
    Clustering,
}

impl std::fmt::Display for PoolStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Clustering => write!(f, "clustering"),
        }
    }
}

/// Progress message sent by pool workers each time a task completes
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub completed: usize,
    pub total: usize,
    pub worker_id: usize,
    pub stage: PoolStage,
}

impl WorkerStatus {
    pub fn new(completed: usize, total: usize, worker_id: usize, stage: PoolStage) -> Self {
        let progress = if total == 0 {
            1.0
        } else {
            completed as f32 / total as f32
        };
        Self {
            progress,
            completed,
            total,
            worker_id,
            stage,
        }
    }
}
