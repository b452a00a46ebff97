use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use foss_build_lib::execute::{OutputSink, TracingSink};
use foss_build_lib::step::{Step, UnknownStep};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{BuildArgs, cmd_build};

/// Unattended build and install of FOSS packages
///
/// Runs the standard sequence autoconf, configure, make, make test, make
/// install in the current directory, or only the steps given, in the order
/// given. Each step's output is kept under log/<index>.<step>/.
#[derive(Parser)]
#[command(name = "foss-build")]
#[command(author, version)]
struct Cli {
  /// Steps to run: autoconf, configure, build, test, install
  #[arg(value_name = "STEP", value_parser = parse_step)]
  steps: Vec<Step>,

  /// Install under /opt/stow/<dir-name> and remember it via a .stow file
  #[arg(long)]
  large: bool,

  /// Run the install step without sudo and remember it via a .no-sudo file
  #[arg(long)]
  no_sudo: bool,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,

  /// Print the run summary as JSON
  #[arg(long)]
  json: bool,
}

fn parse_step(s: &str) -> Result<Step, UnknownStep> {
  s.parse()
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  let sink: Arc<dyn OutputSink> = Arc::new(TracingSink);

  let args = BuildArgs {
    steps: cli.steps,
    large: cli.large,
    no_sudo: cli.no_sudo,
    json: cli.json,
  };

  let status = cmd_build(&args, sink.clone());
  sink.flush();

  Ok(exit_code(status?))
}

/// Exit codes are a byte on Unix; anything outside that range reports failure.
fn exit_code(status: i32) -> ExitCode {
  match u8::try_from(status) {
    Ok(code) => ExitCode::from(code),
    Err(_) => ExitCode::FAILURE,
  }
}
