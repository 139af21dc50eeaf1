pub mod pipeline;
pub mod runner;
pub mod state;

pub use pipeline::{PipelineOptions, ReconPipeline};
pub use runner::{RunOutcome, ToolRunner};
pub use state::StateManager;
