pub mod config;
pub mod orchestrator;
pub mod progress;

pub use config::{AlignConfig, FuseConfig};
pub use orchestrator::{run_fusion, stitch_alignment};
pub use progress::{NoOpReporter, ProgressReporter, StitchStage};
