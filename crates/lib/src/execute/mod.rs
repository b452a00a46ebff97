//! Step execution module.
//!
//! This module provides the pieces that turn a resolved configuration into
//! running processes:
//! - `ProcessRunner`: runs one command, capturing `raw` and `txt` logs
//! - `Pipeline`: walks the steps in order and stops at the first failure
//! - `OutputSink`: where live output goes while a step runs

pub mod pipeline;
pub mod runner;
pub mod sink;
pub mod types;

pub use pipeline::Pipeline;
pub use runner::{ProcessRunner, StepRunner};
pub use sink::{OutputSink, TracingSink};
pub use types::{ExecuteError, LAUNCH_FAILED_STATUS, NOT_EXECUTABLE_STATUS, PipelineResult, StepResult};
