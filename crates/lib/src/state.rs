//! Sticky decisions persisted between invocations.
//!
//! A marker is a boolean whose truth is the existence of a file in the
//! project directory. Markers are only ever created here; removing one by
//! hand is the way to revert the decision.
//!
//! # Storage Layout
//!
//! ```text
//! {project_dir}/
//! ├── .stow        # install under the stow prefix
//! └── .no-sudo     # run `make install` without sudo
//! ```

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

/// A persisted on/off decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
  /// Install into `<stow-base>/<project-dir-name>`.
  Stow,
  /// Do not elevate the install step.
  NoSudo,
}

impl Marker {
  pub fn file_name(self) -> &'static str {
    match self {
      Marker::Stow => ".stow",
      Marker::NoSudo => ".no-sudo",
    }
  }
}

/// Narrow key/value view over persisted markers.
pub trait StateStore {
  fn exists(&self, marker: Marker) -> bool;

  /// Record the marker. Setting an already-set marker is not an error.
  fn set(&self, marker: Marker) -> io::Result<()>;
}

/// Markers stored as empty files in a directory.
#[derive(Debug, Clone)]
pub struct MarkerDir {
  root: PathBuf,
}

impl MarkerDir {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path(&self, marker: Marker) -> PathBuf {
    self.root.join(marker.file_name())
  }
}

impl StateStore for MarkerDir {
  fn exists(&self, marker: Marker) -> bool {
    self.path(marker).exists()
  }

  fn set(&self, marker: Marker) -> io::Result<()> {
    let path = self.path(marker);
    // Open without truncation so an existing marker keeps whatever it holds.
    OpenOptions::new().create(true).append(true).open(&path)?;
    debug!(path = %path.display(), "marker set");
    Ok(())
  }
}

/// In-memory store, for tests and callers that must not touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
  markers: Mutex<HashSet<Marker>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(markers: impl IntoIterator<Item = Marker>) -> Self {
    Self {
      markers: Mutex::new(markers.into_iter().collect()),
    }
  }
}

impl StateStore for MemoryStore {
  fn exists(&self, marker: Marker) -> bool {
    self.markers.lock().map(|m| m.contains(&marker)).unwrap_or(false)
  }

  fn set(&self, marker: Marker) -> io::Result<()> {
    self
      .markers
      .lock()
      .map_err(|_| io::Error::other("marker store lock poisoned"))?
      .insert(marker);
    Ok(())
  }
}
