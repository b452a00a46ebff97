//! Fixed defaults and well-known file names.

/// Parallel jobs passed to `make` when `PARALLEL` is not set.
pub const DEFAULT_PARALLEL: u32 = 8;

/// Install prefix when `PREFIX` is not set and stow is off.
pub const DEFAULT_PREFIX: &str = "/usr/local";

/// Base directory for stow-managed installs (`<base>/<project-dir-name>`).
pub const STOW_PREFIX_BASE: &str = "/opt/stow";

/// Directory, relative to the project root, holding per-step logs.
pub const LOG_DIR: &str = "log";

/// Unmodified captured output of a step.
pub const RAW_LOG: &str = "raw";

/// Sanitized transcript derived from [`RAW_LOG`].
pub const TEXT_LOG: &str = "txt";

/// Presence of this file enables the `autoconf` step.
pub const AUTOCONF_SOURCE: &str = "configure.ac";

/// Environment variable overriding [`DEFAULT_PARALLEL`].
pub const PARALLEL_ENV: &str = "PARALLEL";

/// Environment variable overriding [`DEFAULT_PREFIX`].
pub const PREFIX_ENV: &str = "PREFIX";
