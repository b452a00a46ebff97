//! Destinations for live step output.

use tracing::info;

/// Receives each captured output line as it arrives.
///
/// The sink is created once at startup and handed to the runner, so the
/// operator sees build output while it is still being produced.
pub trait OutputSink: Send + Sync {
  /// `source` names the step the line came from (e.g. `1.build`).
  fn line(&self, source: &str, line: &str);

  /// Called once when the run is over.
  fn flush(&self) {}
}

/// Forwards output lines to the `tracing` subscriber at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
  fn line(&self, source: &str, line: &str) {
    info!(step = source, "{}", line);
  }
}
