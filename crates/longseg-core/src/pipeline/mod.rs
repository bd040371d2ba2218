pub mod config;
pub mod outcome;

mod driver;
mod runner;

pub use config::{PipelineConfig, PIPELINE_NAME};
pub use driver::process_subject;
pub use outcome::{RunSummary, SubjectOutcome, SubjectStatus};
pub use runner::run_cohort;
