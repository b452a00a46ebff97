//! foss-build-lib: Core logic for foss-build
//!
//! This crate drives the conventional autoconf/configure/make sequence for a
//! single source tree:
//! - `Step`: the closed set of build steps and the command each one runs
//! - `BuildConfig`: the resolved prefix, parallelism and sudo/stow choices
//! - `Pipeline`: sequential, fail-fast execution with per-step logs
//! - `StateStore`: sticky trigger markers remembered across invocations

pub mod config;
pub mod consts;
pub mod execute;
pub mod sanitize;
pub mod state;
pub mod step;

#[cfg(test)]
pub(crate) mod testutil;
