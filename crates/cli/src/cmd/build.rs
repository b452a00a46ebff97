//! Implementation of the build run.
//!
//! Resolves the configuration for the current directory, runs the requested
//! steps through the pipeline and prints a summary of what happened.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use foss_build_lib::config::{Environment, ResolveOptions, Resolved, resolve};
use foss_build_lib::execute::{OutputSink, Pipeline, PipelineResult, ProcessRunner};
use foss_build_lib::state::MarkerDir;
use foss_build_lib::step::Step;

use crate::output::{self, format_duration, print_error, print_info, print_json, print_stat, print_success};

/// Arguments for a build run.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
  pub steps: Vec<Step>,
  pub large: bool,
  pub no_sudo: bool,
  pub json: bool,
}

/// Run the build in the current directory.
///
/// Returns the overall exit status: 0 when every step succeeded, otherwise the
/// status of the step that failed. Configuration and log-writing problems are
/// returned as errors before (or instead of) running further steps.
pub fn cmd_build(args: &BuildArgs, sink: Arc<dyn OutputSink>) -> Result<i32> {
  let project_dir = std::env::current_dir().context("Failed to determine the current directory")?;
  debug!(project_dir = %project_dir.display(), steps = ?args.steps, "starting build run");

  let options = ResolveOptions {
    large: args.large,
    no_sudo: args.no_sudo,
    steps: args.steps.clone(),
  };
  let store = MarkerDir::new(&project_dir);
  let resolved =
    resolve(&options, &Environment::from_process(), &store, &project_dir).context("Invalid configuration")?;

  let pipeline = Pipeline::new(ProcessRunner::new(&project_dir, sink), &project_dir);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt
    .block_on(pipeline.execute(&resolved.steps, &resolved.config))
    .context("Build aborted")?;

  if args.json {
    print_json(&summary_json(&resolved, &result))?;
  } else {
    print_summary(&resolved, &result);
  }

  Ok(result.status())
}

fn print_summary(resolved: &Resolved, result: &PipelineResult) {
  println!();
  for step in &result.steps {
    let name = format!("{}.{}", step.index, step.step);
    if step.skipped {
      print_info(&format!("{name} skipped (nothing to do)"));
    } else if let Some(reason) = &step.launch_error {
      print_error(&format!("{name} could not start: {reason}"));
    } else if step.is_success() {
      print_success(&format!("{name} ({})", format_duration(step.duration)));
    } else {
      let log = step
        .text_log
        .as_ref()
        .map(|p| format!(" (see {})", p.display()))
        .unwrap_or_default();
      print_error(&format!("{name} failed with status {}{log}", step.exit_status));
    }
  }

  for (index, step) in not_run(resolved, result) {
    println!("{} {index}.{step} not run", output::symbols::MINUS);
  }

  println!();
  print_stat("Prefix", &resolved.config.prefix.display().to_string());
  print_stat("Jobs", &resolved.config.parallelism.to_string());
  print_stat("Sudo", if resolved.config.use_sudo { "yes" } else { "no" });
  print_stat("Elapsed", &format_duration(result.total_duration()));
}

fn summary_json(resolved: &Resolved, result: &PipelineResult) -> serde_json::Value {
  let steps: Vec<_> = result
    .steps
    .iter()
    .map(|s| {
      serde_json::json!({
        "index": s.index,
        "step": s.step,
        "status": s.exit_status,
        "skipped": s.skipped,
        "launch_error": s.launch_error,
        "duration_ms": s.duration.as_millis() as u64,
        "raw_log": s.raw_log,
        "text_log": s.text_log,
      })
    })
    .collect();
  let not_run: Vec<_> = not_run(resolved, result)
    .map(|(index, step)| serde_json::json!({ "index": index, "step": step }))
    .collect();

  serde_json::json!({
    "status": result.status(),
    "config": resolved.config,
    "steps": steps,
    "not_run": not_run,
  })
}

/// Requested steps that never started because an earlier one failed.
fn not_run(resolved: &Resolved, result: &PipelineResult) -> impl Iterator<Item = (usize, Step)> {
  let executed = result.steps.len();
  resolved.steps.iter().copied().enumerate().skip(executed)
}
