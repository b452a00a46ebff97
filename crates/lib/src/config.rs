//! Resolution of the effective build configuration.
//!
//! Combines command-line flags, persisted markers and environment variables
//! into a single [`BuildConfig`] for the run, and records sticky flags so the
//! next invocation picks them up without being told again.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{DEFAULT_PARALLEL, DEFAULT_PREFIX, PARALLEL_ENV, PREFIX_ENV, STOW_PREFIX_BASE};
use crate::state::{Marker, StateStore};
use crate::step::Step;

/// Effective configuration for one run. Never changes once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
  /// Value passed to `./configure --prefix=`.
  pub prefix: PathBuf,
  /// Value passed to `make -j`.
  pub parallelism: u32,
  /// Wrap `make install` in `sudo`.
  pub use_sudo: bool,
  /// Prefix was switched to the stow tree.
  pub use_stow: bool,
}

/// Flags from the command line.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
  /// `--large`: install under the stow prefix and remember that choice.
  pub large: bool,
  /// `--no-sudo`: install without sudo and remember that choice.
  pub no_sudo: bool,
  /// Explicit steps; empty means the canonical sequence.
  pub steps: Vec<Step>,
}

/// Environment variables consulted during resolution.
///
/// Values are kept as raw OS strings so that a value which is not valid
/// Unicode is still seen, and rejected or passed through, by [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct Environment {
  pub parallel: Option<OsString>,
  pub prefix: Option<OsString>,
}

impl Environment {
  /// Snapshot the relevant variables from the process environment.
  pub fn from_process() -> Self {
    Self {
      parallel: std::env::var_os(PARALLEL_ENV),
      prefix: std::env::var_os(PREFIX_ENV),
    }
  }
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  pub config: BuildConfig,
  pub steps: Vec<Step>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("PARALLEL must be a positive integer, got '{0}'")]
  InvalidParallel(String),

  #[error("cannot derive a project name from {0}")]
  NoProjectName(PathBuf),

  #[error("failed to write {marker} trigger file: {source}")]
  PersistMarker {
    marker: &'static str,
    #[source]
    source: io::Error,
  },
}

/// Resolve the configuration for this run.
///
/// Side effects: creates the `.stow` marker when stow is in effect and the
/// `.no-sudo` marker when `--no-sudo` was passed. Both are created before
/// any step runs and are never removed.
///
/// The two writes are not atomic: if `.stow` is written and writing
/// `.no-sudo` then fails, `.stow` stays in place and the error is returned.
/// Every check that can reject the configuration runs before either write.
pub fn resolve(
  options: &ResolveOptions,
  env: &Environment,
  store: &impl StateStore,
  project_dir: &Path,
) -> Result<Resolved, ConfigError> {
  let parallelism = parse_parallel(env.parallel.as_deref())?;

  let use_stow = options.large || store.exists(Marker::Stow);
  let use_sudo = !(options.no_sudo || store.exists(Marker::NoSudo));

  let prefix = if use_stow {
    let name = project_dir
      .file_name()
      .ok_or_else(|| ConfigError::NoProjectName(project_dir.to_path_buf()))?;
    PathBuf::from(STOW_PREFIX_BASE).join(name)
  } else {
    env
      .prefix
      .as_ref()
      .filter(|p| !p.is_empty())
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFIX))
  };

  if use_stow {
    persist(store, Marker::Stow)?;
  }
  if options.no_sudo {
    persist(store, Marker::NoSudo)?;
  }

  let steps = if options.steps.is_empty() {
    Step::CANONICAL.to_vec()
  } else {
    options.steps.clone()
  };

  let config = BuildConfig {
    prefix,
    parallelism,
    use_sudo,
    use_stow,
  };

  info!(
    prefix = %config.prefix.display(),
    parallelism = config.parallelism,
    sudo = config.use_sudo,
    stow = config.use_stow,
    "resolved build configuration"
  );

  Ok(Resolved { config, steps })
}

fn parse_parallel(value: Option<&OsStr>) -> Result<u32, ConfigError> {
  let value = value
    .map(|raw| {
      raw
        .to_str()
        .ok_or_else(|| ConfigError::InvalidParallel(raw.to_string_lossy().into_owned()))
    })
    .transpose()?;

  match value.map(str::trim) {
    None | Some("") => Ok(DEFAULT_PARALLEL),
    Some(raw) => match raw.parse::<u32>() {
      Ok(n) if n > 0 => Ok(n),
      _ => Err(ConfigError::InvalidParallel(raw.to_string())),
    },
  }
}

fn persist(store: &impl StateStore, marker: Marker) -> Result<(), ConfigError> {
  store.set(marker).map_err(|source| ConfigError::PersistMarker {
    marker: marker.file_name(),
    source,
  })?;
  debug!(marker = marker.file_name(), "persisted trigger");
  Ok(())
}
