//! Process runner: executes one command and captures its output.
//!
//! The child's stdout and stderr share a single pipe, so the captured stream
//! interleaves them the way a terminal would show them. While the child runs,
//! its output is copied line by line into `raw` and to the output sink; once
//! it exits, `txt` is derived from the complete `raw` file.
//!
//! # Log Layout
//!
//! ```text
//! {log_dir}/
//! ├── raw     # bytes exactly as produced
//! └── txt     # sanitized transcript
//! ```

use std::future::Future;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::unix::pipe;
use tokio::process::Command;
use tracing::{debug, info};

use super::sink::OutputSink;
use super::types::ExecuteError;
use crate::consts::{RAW_LOG, TEXT_LOG};
use crate::sanitize::sanitize;

/// Runs a single step command, logging into `log_dir`.
///
/// Returns the command's exit status. A non-zero status is not an error here;
/// deciding what to do about it is the caller's business.
pub trait StepRunner {
  fn run(&self, command: &[String], log_dir: &Path) -> impl Future<Output = Result<i32, ExecuteError>> + Send;
}

/// Runs commands as child processes of this one.
#[derive(Clone)]
pub struct ProcessRunner {
  working_dir: PathBuf,
  sink: Arc<dyn OutputSink>,
}

impl ProcessRunner {
  /// Create a runner that starts commands in `working_dir`.
  pub fn new(working_dir: impl Into<PathBuf>, sink: Arc<dyn OutputSink>) -> Self {
    Self {
      working_dir: working_dir.into(),
      sink,
    }
  }

  pub fn working_dir(&self) -> &Path {
    &self.working_dir
  }

  async fn run_process(&self, command: &[String], log_dir: &Path) -> Result<i32, ExecuteError> {
    let (program, args) = command.split_first().ok_or(ExecuteError::EmptyCommand)?;

    tokio::fs::create_dir_all(log_dir)
      .await
      .map_err(|source| ExecuteError::CreateLogDir {
        path: log_dir.to_path_buf(),
        source,
      })?;

    let raw_path = log_dir.join(RAW_LOG);
    let text_path = log_dir.join(TEXT_LOG);
    let label = log_dir
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| program.clone());

    let mut raw = File::create(&raw_path).await?;

    let (reader, writer) = io::pipe()?;
    let stderr = writer.try_clone()?;

    let mut cmd = Command::new(program);
    cmd
      .args(args)
      .current_dir(&self.working_dir)
      .stdout(writer)
      .stderr(stderr)
      .kill_on_drop(true);

    debug!(program = %program, working_dir = ?self.working_dir, "spawning process");

    let mut child = match cmd.spawn() {
      Ok(child) => child,
      Err(source) => {
        let err = ExecuteError::Spawn {
          program: program.clone(),
          source,
        };
        let message = format!("{err}\n");
        raw.write_all(message.as_bytes()).await?;
        raw.flush().await?;
        tokio::fs::write(&text_path, sanitize(&message)).await?;
        return Err(err);
      }
    };

    // The command still owns our copies of the pipe's write end; the reader
    // only sees EOF once every write end is closed.
    drop(cmd);

    let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;

    let (drained, status) = tokio::join!(
      drain_lines(receiver, &mut raw, self.sink.as_ref(), &label),
      child.wait()
    );
    drained?;
    let status = exit_code(status?);

    raw.flush().await?;
    drop(raw);

    let captured = tokio::fs::read(&raw_path).await?;
    tokio::fs::write(&text_path, sanitize(&String::from_utf8_lossy(&captured))).await?;

    info!(step = %label, status, "process exited");

    Ok(status)
  }
}

impl std::fmt::Debug for ProcessRunner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProcessRunner")
      .field("working_dir", &self.working_dir)
      .finish_non_exhaustive()
  }
}

impl StepRunner for ProcessRunner {
  fn run(&self, command: &[String], log_dir: &Path) -> impl Future<Output = Result<i32, ExecuteError>> + Send {
    self.run_process(command, log_dir)
  }
}

/// Copy `reader` into `raw` one line at a time, echoing each line to `sink`.
///
/// Lines are written verbatim, including their terminator and any bytes that
/// are not valid UTF-8.
async fn drain_lines<R>(reader: R, raw: &mut File, sink: &dyn OutputSink, label: &str) -> io::Result<()>
where
  R: AsyncRead + Unpin,
{
  let mut reader = BufReader::new(reader);
  let mut line = Vec::new();

  loop {
    line.clear();
    if reader.read_until(b'\n', &mut line).await? == 0 {
      return Ok(());
    }
    raw.write_all(&line).await?;

    let text = String::from_utf8_lossy(&line);
    sink.line(label, text.trim_end_matches(['\n', '\r']));
  }
}

/// Map a wait status to an integer exit code; signals become `128 + signo`.
fn exit_code(status: ExitStatus) -> i32 {
  status
    .code()
    .unwrap_or_else(|| 128 + status.signal().unwrap_or_default())
}
