pub mod aggregate;
pub mod engine;
pub mod xcorr;

pub use aggregate::{aggregate, AggregationMode, PairShift};
pub use engine::{build_jobs, run_alignment, AlignJob, Measurement};
pub use xcorr::{correlate_stack, normxcorr_valid, CorrelationPeak};
