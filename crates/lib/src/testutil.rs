//! Test utilities for foss-build-lib.

use std::sync::Mutex;

use crate::execute::OutputSink;

/// Returns a command line that runs `script` through `/bin/sh`.
pub fn shell(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Output sink that remembers every line it is given.
#[derive(Debug, Default)]
pub struct MemorySink {
  lines: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
  pub fn lines(&self) -> Vec<(String, String)> {
    self.lines.lock().unwrap().clone()
  }
}

impl OutputSink for MemorySink {
  fn line(&self, source: &str, line: &str) {
    self.lines.lock().unwrap().push((source.to_string(), line.to_string()));
  }
}
