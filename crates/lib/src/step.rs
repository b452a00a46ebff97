//! Build steps and the command line each one runs.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::config::BuildConfig;
use crate::consts::AUTOCONF_SOURCE;

/// One stage of the conventional source build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
  Autoconf,
  Configure,
  Build,
  Test,
  Install,
}

/// A step name outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown step '{0}' (expected one of: autoconf, configure, build, test, install)")]
pub struct UnknownStep(pub String);

impl Step {
  /// Steps run when none are given, in order.
  pub const CANONICAL: [Step; 5] = [Step::Autoconf, Step::Configure, Step::Build, Step::Test, Step::Install];

  pub fn as_str(self) -> &'static str {
    match self {
      Step::Autoconf => "autoconf",
      Step::Configure => "configure",
      Step::Build => "build",
      Step::Test => "test",
      Step::Install => "install",
    }
  }

  /// The command line this step runs, or `None` when the step has nothing to do.
  ///
  /// `autoconf` is a no-op unless `configure.ac` exists in `project_dir`.
  /// `install` is wrapped in `sudo` when the config asks for it.
  pub fn command(self, config: &BuildConfig, project_dir: &Path) -> Option<Vec<String>> {
    let jobs = format!("-j{}", config.parallelism);

    let command = match self {
      Step::Autoconf => {
        if !project_dir.join(AUTOCONF_SOURCE).exists() {
          return None;
        }
        vec!["autoconf".to_string()]
      }
      Step::Configure => vec!["./configure".to_string(), format!("--prefix={}", config.prefix.display())],
      Step::Build => vec!["make".to_string(), jobs],
      Step::Test => vec!["make".to_string(), jobs, "test".to_string()],
      Step::Install => {
        let mut command = vec!["make".to_string(), jobs, "install".to_string()];
        if config.use_sudo {
          command.insert(0, "sudo".to_string());
        }
        command
      }
    };

    Some(command)
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Step {
  type Err = UnknownStep;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Step::CANONICAL
      .into_iter()
      .find(|step| step.as_str() == s)
      .ok_or_else(|| UnknownStep(s.to_string()))
  }
}
