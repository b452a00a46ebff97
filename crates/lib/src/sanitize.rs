//! Output sanitizer for human-readable step transcripts.
//!
//! Turns captured terminal output into plain text:
//! - strips CSI escape sequences (colours, cursor movement)
//! - strips xterm title sequences (`ESC ] 0 ; ... BEL`)
//! - drops remaining control bytes, keeping only `\n`
//! - removes blank and whitespace-only lines
//!
//! The transform is idempotent: `sanitize(&sanitize(s)) == sanitize(s)`.

use std::sync::LazyLock;

use regex::Regex;

static CSI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("valid regex"));

static XTERM_TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\]0;.*?\x07").expect("valid regex"));

static CONTROL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[\x00-\x09\x0B-\x1F\x7F]").expect("valid regex"));

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

static NEWLINE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

/// Sanitize raw captured output into a readable transcript.
///
/// Escape sequences go first so their ESC/BEL bytes are removed as a unit
/// before the control-byte pass sees them.
pub fn sanitize(raw: &str) -> String {
  let text = CSI.replace_all(raw, "");
  let text = XTERM_TITLE.replace_all(&text, "");
  let text = CONTROL.replace_all(&text, "");
  let text = BLANK_LINES.replace_all(&text, "\n");
  NEWLINE_RUNS.replace_all(&text, "\n").into_owned()
}
