//! Atomic activation of a staging snapshot.
//!
//! The active reference is a symlink swapped with a write-then-rename: the
//! new link is created at a sibling temp path and renamed over the old one,
//! so a reader resolving the link always sees either the previous target or
//! the new one, never a missing link.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ActivationError {
  #[error("failed to remove stale temp link {link}: {source}")]
  ClearStale {
    link: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create symlink {link} -> {target}: {source}")]
  CreateLink {
    link: PathBuf,
    target: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to swap active link {link}: {source}")]
  Swap {
    link: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read active link {link}: {source}")]
  ReadLink {
    link: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Point `active_link` at `snapshot`, replacing any previous target.
pub fn activate(snapshot: &Path, active_link: &Path) -> Result<(), ActivationError> {
  let temp_link = temp_link_path(active_link);

  // A crashed swap can leave the temp link behind.
  match fs::remove_file(&temp_link) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(source) => {
      return Err(ActivationError::ClearStale {
        link: temp_link.clone(),
        source,
      });
    }
  }

  symlink(snapshot, &temp_link).map_err(|source| ActivationError::CreateLink {
    link: temp_link.clone(),
    target: snapshot.to_path_buf(),
    source,
  })?;

  fs::rename(&temp_link, active_link).map_err(|source| ActivationError::Swap {
    link: active_link.to_path_buf(),
    source,
  })?;

  info!(active = %active_link.display(), target = %snapshot.display(), "activated snapshot");
  Ok(())
}

/// Resolve the snapshot the active link points at, or `None` before the
/// first activation.
pub fn current_target(active_link: &Path) -> Result<Option<PathBuf>, ActivationError> {
  match fs::read_link(active_link) {
    Ok(target) => Ok(Some(target)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(ActivationError::ReadLink {
      link: active_link.to_path_buf(),
      source,
    }),
  }
}

fn temp_link_path(active_link: &Path) -> PathBuf {
  let mut name = active_link.as_os_str().to_os_string();
  name.push(".tmp");
  PathBuf::from(name)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn activate_creates_the_link() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("staging/1000");
    fs::create_dir_all(&snapshot).unwrap();
    let link = temp.path().join("active");

    activate(&snapshot, &link).unwrap();

    assert_eq!(fs::read_link(&link).unwrap(), snapshot);
    assert_eq!(current_target(&link).unwrap(), Some(snapshot));
  }

  #[test]
  fn activate_replaces_the_previous_target() {
    let temp = TempDir::new().unwrap();
    let old = temp.path().join("staging/1000");
    let new = temp.path().join("staging/1005");
    fs::create_dir_all(&old).unwrap();
    fs::create_dir_all(&new).unwrap();
    let link = temp.path().join("active");

    activate(&old, &link).unwrap();
    activate(&new, &link).unwrap();

    assert_eq!(fs::read_link(&link).unwrap(), new);
    // Switching never deletes the previous snapshot
    assert!(old.is_dir());
  }

  #[test]
  fn activate_leaves_no_temp_link() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("1000");
    fs::create_dir_all(&snapshot).unwrap();
    let link = temp.path().join("active");

    activate(&snapshot, &link).unwrap();

    assert!(!temp.path().join("active.tmp").exists());
  }

  #[test]
  fn activate_clears_a_stale_temp_link() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("1000");
    fs::create_dir_all(&snapshot).unwrap();
    let link = temp.path().join("active");
    symlink(temp.path().join("gone"), temp.path().join("active.tmp")).unwrap();

    activate(&snapshot, &link).unwrap();

    assert_eq!(fs::read_link(&link).unwrap(), snapshot);
    assert!(!temp.path().join("active.tmp").exists());
  }

  #[test]
  fn current_target_is_none_before_first_activation() {
    let temp = TempDir::new().unwrap();
    assert_eq!(current_target(&temp.path().join("active")).unwrap(), None);
  }

  #[test]
  fn activate_fails_without_parent_directory() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("1000");
    fs::create_dir_all(&snapshot).unwrap();

    let result = activate(&snapshot, &temp.path().join("missing/active"));
    assert!(matches!(result, Err(ActivationError::CreateLink { .. })));
  }
}
