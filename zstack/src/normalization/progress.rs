//! Progress reporting for normalization runs.

use common::SharedFn;

/// Progress information for a normalization run.
#[derive(Debug, Clone)]
pub struct NormalizationProgress {
    /// Slices finished so far in this stage (1-based once work has started).
    pub current: usize,
    /// Total number of slices in this stage.
    pub total: usize,
    pub stage: NormalizationStage,
}

impl NormalizationProgress {
    /// Completed share of the stage, in [0, 1].
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.current as f32 / self.total as f32
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// Stage of a normalization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationStage {
    /// Voting the foreground mask across the reference stack.
    BuildingMask,
    /// Dividing target slices by their reference statistic.
    Normalizing,
}

/// Callback type for progress reporting.
pub type ProgressCallback = SharedFn<dyn Fn(NormalizationProgress) + Send + Sync>;

/// Report progress using the callback if set.
pub fn report_progress(
    callback: &ProgressCallback,
    current: usize,
    total: usize,
    stage: NormalizationStage,
) {
    if let Some(f) = callback.as_ref() {
        f(NormalizationProgress {
            current,
            total,
            stage,
        });
    }
}
