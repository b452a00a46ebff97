//! Sequential, fail-fast execution of build steps.
//!
//! Each step moves Pending → Running → Succeeded/Failed, strictly in order.
//! The first failure ends the run; later steps are never started.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info, warn};

use super::runner::StepRunner;
use super::types::{ExecuteError, PipelineResult, StepResult};
use crate::config::BuildConfig;
use crate::consts::{LOG_DIR, RAW_LOG, TEXT_LOG};
use crate::step::Step;

/// Runs steps for one project through a [`StepRunner`].
#[derive(Debug)]
pub struct Pipeline<R> {
  runner: R,
  project_dir: PathBuf,
  log_root: PathBuf,
}

impl<R: StepRunner> Pipeline<R> {
  /// Logs go to `{project_dir}/log`.
  pub fn new(runner: R, project_dir: impl Into<PathBuf>) -> Self {
    let project_dir = project_dir.into();
    let log_root = project_dir.join(LOG_DIR);
    Self {
      runner,
      project_dir,
      log_root,
    }
  }

  pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
    self.log_root = log_root.into();
    self
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  /// Log directory for the step at `index`: `{log_root}/{index}.{step}`.
  ///
  /// The index keeps directories distinct when a step appears more than once.
  pub fn log_dir(&self, index: usize, step: Step) -> PathBuf {
    self.log_root.join(format!("{index}.{step}"))
  }

  /// Run `steps` in order, stopping at the first non-zero exit status.
  ///
  /// A command that cannot be launched counts as a failed step (status 127,
  /// or 126 if it is not executable). Errors creating or writing logs abort
  /// the run and are returned as `Err`.
  pub async fn execute(&self, steps: &[Step], config: &BuildConfig) -> Result<PipelineResult, ExecuteError> {
    info!(steps = steps.len(), log_root = %self.log_root.display(), "starting pipeline");

    let mut result = PipelineResult::default();

    for (index, &step) in steps.iter().enumerate() {
      let outcome = self.execute_step(index, step, config).await?;
      let failed = !outcome.is_success();
      result.steps.push(outcome);

      if failed {
        let remaining = steps.len() - index - 1;
        if remaining > 0 {
          warn!(index, %step, remaining, "stopping after failed step");
        }
        break;
      }
    }

    info!(status = result.status(), "pipeline finished");
    Ok(result)
  }

  async fn execute_step(&self, index: usize, step: Step, config: &BuildConfig) -> Result<StepResult, ExecuteError> {
    let log_dir = self.log_dir(index, step);
    let started = Instant::now();

    let mut outcome = StepResult {
      step,
      index,
      exit_status: 0,
      raw_log: None,
      text_log: None,
      skipped: false,
      launch_error: None,
      duration: Default::default(),
    };

    let Some(command) = step.command(config, &self.project_dir) else {
      info!(index, %step, "nothing to do, skipping");
      outcome.skipped = true;
      return Ok(outcome);
    };

    info!(index, %step, command = %command.join(" "), "running step");
    outcome.raw_log = Some(log_dir.join(RAW_LOG));
    outcome.text_log = Some(log_dir.join(TEXT_LOG));

    match self.runner.run(&command, &log_dir).await {
      Ok(status) => outcome.exit_status = status,
      Err(err) => match err.launch_status() {
        Some(status) => {
          error!(index, %step, error = %err, "could not launch step command");
          outcome.exit_status = status;
          outcome.launch_error = Some(err.to_string());
        }
        None => return Err(err),
      },
    }

    outcome.duration = started.elapsed();

    if outcome.is_success() {
      info!(index, %step, "step succeeded");
    } else {
      error!(index, %step, status = outcome.exit_status, log = %log_dir.join(TEXT_LOG).display(), "step failed");
    }

    Ok(outcome)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::execute::ProcessRunner;
  use crate::testutil::MemorySink;
  use std::collections::VecDeque;
  use std::future::Future;
  use std::io;
  use std::path::Path;
  use std::sync::{Arc, Mutex};
  use serial_test::serial;
  use tempfile::TempDir;

  /// Scripted runner: hands out queued results and records every call.
  #[derive(Default)]
  struct FakeRunner {
    results: Mutex<VecDeque<Result<i32, ExecuteError>>>,
    calls: Mutex<Vec<(Vec<String>, PathBuf)>>,
  }

  impl FakeRunner {
    fn with_statuses(statuses: &[i32]) -> Self {
      let runner = Self::default();
      runner.results.lock().unwrap().extend(statuses.iter().map(|s| Ok(*s)));
      runner
    }

    fn push_error(&self, err: ExecuteError) {
      self.results.lock().unwrap().push_back(Err(err));
    }

    fn calls(&self) -> Vec<(Vec<String>, PathBuf)> {
      self.calls.lock().unwrap().clone()
    }
  }

  impl StepRunner for FakeRunner {
    fn run(&self, command: &[String], log_dir: &Path) -> impl Future<Output = Result<i32, ExecuteError>> + Send {
      self.calls.lock().unwrap().push((command.to_vec(), log_dir.to_path_buf()));
      let next = self.results.lock().unwrap().pop_front().unwrap_or(Ok(0));
      async move { next }
    }
  }

  fn config() -> BuildConfig {
    BuildConfig {
      prefix: PathBuf::from("/opt/x"),
      parallelism: 4,
      use_sudo: false,
      use_stow: false,
    }
  }

  #[tokio::test]
  async fn all_steps_succeed() {
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::new(FakeRunner::default(), temp.path());

    let result = pipeline
      .execute(&[Step::Configure, Step::Build, Step::Test, Step::Install], &config())
      .await
      .unwrap();

    assert!(result.is_success());
    assert_eq!(result.status(), 0);
    assert_eq!(result.steps.len(), 4);

    let commands: Vec<_> = pipeline.runner().calls().into_iter().map(|(c, _)| c.join(" ")).collect();
    assert_eq!(
      commands,
      vec!["./configure --prefix=/opt/x", "make -j4", "make -j4 test", "make -j4 install"]
    );
  }

  #[tokio::test]
  async fn stops_at_first_failure() {
    let steps = [Step::Configure, Step::Build, Step::Test, Step::Install];

    for k in 0..steps.len() {
      let temp = TempDir::new().unwrap();
      let mut statuses = vec![0; k];
      statuses.push(2);
      let pipeline = Pipeline::new(FakeRunner::with_statuses(&statuses), temp.path());

      let result = pipeline.execute(&steps, &config()).await.unwrap();

      assert_eq!(pipeline.runner().calls().len(), k + 1, "failing step {k}");
      assert_eq!(result.steps.len(), k + 1);
      assert_eq!(result.status(), 2);
      assert_eq!(result.failed().unwrap().index, k);
    }
  }

  #[tokio::test]
  async fn exact_failing_status_is_propagated() {
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::new(FakeRunner::with_statuses(&[0, 77]), temp.path());

    let result = pipeline.execute(&[Step::Build, Step::Test, Step::Install], &config()).await.unwrap();

    assert_eq!(result.status(), 77);
    assert_eq!(result.steps.last().unwrap().step, Step::Test);
  }

  #[tokio::test]
  async fn autoconf_without_configure_ac_never_runs_a_process() {
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::new(FakeRunner::default(), temp.path());

    let result = pipeline.execute(&[Step::Autoconf, Step::Build], &config()).await.unwrap();

    let calls = pipeline.runner().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, vec!["make", "-j4"]);
    assert!(result.steps[0].skipped);
    assert_eq!(result.steps[0].exit_status, 0);
    assert_eq!(result.steps[0].raw_log, None);
    assert_eq!(result.steps[0].text_log, None);
    assert!(result.is_success());
  }

  #[tokio::test]
  async fn autoconf_runs_with_configure_ac() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("configure.ac"), "").unwrap();
    let pipeline = Pipeline::new(FakeRunner::default(), temp.path());

    let result = pipeline.execute(&[Step::Autoconf], &config()).await.unwrap();

    assert_eq!(pipeline.runner().calls()[0].0, vec!["autoconf"]);
    assert!(!result.steps[0].skipped);
  }

  #[tokio::test]
  async fn log_dirs_are_keyed_by_index_and_name() {
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::new(FakeRunner::default(), temp.path());

    pipeline
      .execute(&[Step::Build, Step::Build, Step::Install], &config())
      .await
      .unwrap();

    let dirs: Vec<_> = pipeline.runner().calls().into_iter().map(|(_, d)| d).collect();
    assert_eq!(
      dirs,
      vec![
        temp.path().join("log/0.build"),
        temp.path().join("log/1.build"),
        temp.path().join("log/2.install"),
      ]
    );
  }

  #[tokio::test]
  async fn launch_failure_fails_the_step() {
    let temp = TempDir::new().unwrap();
    let runner = FakeRunner::default();
    runner.push_error(ExecuteError::Spawn {
      program: "./configure".to_string(),
      source: io::Error::from(io::ErrorKind::NotFound),
    });
    let pipeline = Pipeline::new(runner, temp.path());

    let result = pipeline.execute(&[Step::Configure, Step::Build], &config()).await.unwrap();

    assert_eq!(pipeline.runner().calls().len(), 1);
    assert_eq!(result.status(), 127);
    assert!(result.steps[0].launch_error.as_deref().unwrap().contains("./configure"));
  }

  #[tokio::test]
  async fn filesystem_errors_abort_the_run() {
    let temp = TempDir::new().unwrap();
    let runner = FakeRunner::default();
    runner.push_error(ExecuteError::CreateLogDir {
      path: temp.path().join("log/0.build"),
      source: io::Error::from(io::ErrorKind::PermissionDenied),
    });
    let pipeline = Pipeline::new(runner, temp.path());

    let err = pipeline.execute(&[Step::Build, Step::Test], &config()).await.unwrap_err();

    assert!(matches!(err, ExecuteError::CreateLogDir { .. }));
    assert_eq!(pipeline.runner().calls().len(), 1);
  }

  #[tokio::test]
  async fn custom_log_root() {
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::new(FakeRunner::default(), temp.path()).with_log_root(temp.path().join("elsewhere"));

    assert_eq!(pipeline.log_dir(3, Step::Test), temp.path().join("elsewhere/3.test"));
  }

  #[tokio::test]
  #[serial]
  async fn real_runner_writes_log_layout() {
    let temp = TempDir::new().unwrap();
    let project = temp.path();
    std::fs::write(project.join("configure"), "#!/bin/sh\necho configured \"$@\"\n").unwrap();
    set_executable(&project.join("configure"));

    let sink = Arc::new(MemorySink::default());
    let pipeline = Pipeline::new(ProcessRunner::new(project, sink.clone()), project);

    let result = pipeline.execute(&[Step::Configure], &config()).await.unwrap();

    assert!(result.is_success());
    let log = project.join("log/0.configure");
    assert_eq!(
      std::fs::read_to_string(log.join("raw")).unwrap(),
      "configured --prefix=/opt/x\n"
    );
    assert!(log.join("txt").is_file());
    assert_eq!(result.steps[0].raw_log, Some(log.join("raw")));
    assert_eq!(result.steps[0].text_log, Some(log.join("txt")));
    assert_eq!(sink.lines()[0].0, "0.configure");
  }

  #[tokio::test]
  #[serial]
  async fn real_runner_missing_configure_script_fails_with_127() {
    let temp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let pipeline = Pipeline::new(ProcessRunner::new(temp.path(), sink), temp.path());

    let result = pipeline.execute(&[Step::Configure, Step::Build], &config()).await.unwrap();

    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.status(), 127);
  }

  fn set_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }
}
