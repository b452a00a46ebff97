//! Types for step execution.
//!
//! This module defines the error type, per-step results and the overall
//! pipeline result produced by the orchestrator.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::step::Step;

/// Exit status recorded when a step's program could not be executed.
pub const LAUNCH_FAILED_STATUS: i32 = 127;

/// Exit status recorded when a step's program exists but is not executable.
pub const NOT_EXECUTABLE_STATUS: i32 = 126;

/// Errors that can occur while running a step.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// A step produced an empty command line.
  #[error("empty command")]
  EmptyCommand,

  /// The step's log directory could not be created.
  #[error("failed to create log directory {path}: {source}")]
  CreateLogDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The child process could not be started.
  #[error("failed to launch {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// I/O error while capturing output or writing logs.
  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

impl ExecuteError {
  /// Exit status to report for a launch failure, following shell conventions.
  pub fn launch_status(&self) -> Option<i32> {
    match self {
      ExecuteError::Spawn { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
        Some(NOT_EXECUTABLE_STATUS)
      }
      ExecuteError::Spawn { .. } => Some(LAUNCH_FAILED_STATUS),
      _ => None,
    }
  }
}

/// Outcome of one step. Created once, never modified.
#[derive(Debug, Clone)]
pub struct StepResult {
  pub step: Step,

  /// Position of the step in this run (0-based).
  pub index: usize,

  /// Exit status of the step's command, 0 for a skipped step.
  pub exit_status: i32,

  /// Unmodified captured output; `None` when the step was skipped.
  pub raw_log: Option<PathBuf>,

  /// Sanitized transcript; `None` when the step was skipped.
  pub text_log: Option<PathBuf>,

  /// The step had nothing to do and no process was started.
  pub skipped: bool,

  /// Why the command could not be started, if it wasn't.
  pub launch_error: Option<String>,

  pub duration: Duration,
}

impl StepResult {
  pub fn is_success(&self) -> bool {
    self.exit_status == 0
  }
}

/// Result of running a sequence of steps.
///
/// Steps after the first failure are never run and so never appear here.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
  pub steps: Vec<StepResult>,
}

impl PipelineResult {
  /// The step that stopped the run, if any.
  pub fn failed(&self) -> Option<&StepResult> {
    self.steps.iter().find(|s| !s.is_success())
  }

  pub fn is_success(&self) -> bool {
    self.failed().is_none()
  }

  /// Overall exit status: 0, or the status of the failing step.
  pub fn status(&self) -> i32 {
    self.failed().map_or(0, |s| s.exit_status)
  }

  pub fn total_duration(&self) -> Duration {
    self.steps.iter().map(|s| s.duration).sum()
  }
}
