//! Filesystem layout for the agent's working directory.
//!
//! Everything the agent persists lives under one configurable working root:
//!
//! ```text
//! <root>/
//! ├── tarballs/               # Cached artifact downloads
//! │   └── <namespace>/
//! │       └── <tarball-name>
//! ├── staging/                # Extracted snapshots, one per deploy
//! │   └── <unix-seconds>/
//! └── active                  # Symlink to the live staging snapshot
//! ```
//!
//! The layout is resolved once from the deployment config and passed
//! explicitly to every component that touches the filesystem.

use std::io;
use std::path::{Path, PathBuf};

/// Working root used when the config does not override it.
pub const DEFAULT_WORK_ROOT: &str = "/var/lib/stagehand";

const TARBALL_DIR: &str = "tarballs";
const STAGING_DIR: &str = "staging";
const ACTIVE_LINK: &str = "active";

/// Resolved locations under one working root.
#[derive(Debug, Clone)]
pub struct WorkPaths {
  root: PathBuf,
}

impl WorkPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Directory holding cached artifact downloads.
  pub fn tarball_dir(&self) -> PathBuf {
    self.root.join(TARBALL_DIR)
  }

  /// Directory holding extracted staging snapshots.
  pub fn staging_dir(&self) -> PathBuf {
    self.root.join(STAGING_DIR)
  }

  /// Symlink pointing at the live staging snapshot.
  pub fn active_link(&self) -> PathBuf {
    self.root.join(ACTIVE_LINK)
  }

  /// Canonical path of the cached tarball for a namespace.
  ///
  /// Downloads land here, the local fingerprint is computed from here, and
  /// extraction reads from here.
  pub fn tarball_path(&self, namespace: &str, tarball_name: &str) -> PathBuf {
    self.tarball_dir().join(namespace).join(tarball_name)
  }

  /// Create the directories the agent needs (root, tarballs, staging).
  ///
  /// The active symlink is created by the first successful deploy, not here.
  pub fn ensure_layout(&self) -> io::Result<()> {
    for dir in [self.root.clone(), self.tarball_dir(), self.staging_dir()] {
      std::fs::create_dir_all(dir)?;
    }
    Ok(())
  }
}
