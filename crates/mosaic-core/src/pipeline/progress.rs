/// Stitching stage, used for progress reporting.
#[derive(Clone, Copy, Debug)]
pub enum StitchStage {
    Alignment,
    Aggregation,
    Fusion,
    Writing,
}

impl std::fmt::Display for StitchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alignment => write!(f, "Aligning tile pairs"),
            Self::Aggregation => write!(f, "Aggregating measurements"),
            Self::Fusion => write!(f, "Fusing tiles"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for the stitching pipeline.
///
/// Implementors can drive progress bars or logging; all methods default to
/// no-ops.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g. alignment jobs), if known.
    fn begin_stage(&self, _stage: StitchStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
