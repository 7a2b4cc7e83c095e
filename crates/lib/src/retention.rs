//! Retention policy for staged snapshots.
//!
//! Snapshot directories are named by unix seconds, so the numeric value of
//! the name is the ordering key. Pruning removes the oldest snapshots until
//! at most `max_staged` remain. Entries that are not numeric directories
//! are left alone.

use std::path::{Path, PathBuf};
use std::{fs, io};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum RetentionError {
  #[error("failed to read staging directory {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug)]
pub struct PruneResult {
  pub removed: Vec<PathBuf>,
  pub bytes_freed: u64,
}

/// List snapshot directories under `staging_dir`, oldest first.
pub fn list_snapshots(staging_dir: &Path) -> Result<Vec<(u64, PathBuf)>, RetentionError> {
  let entries = fs::read_dir(staging_dir).map_err(|source| RetentionError::ReadDir {
    path: staging_dir.to_path_buf(),
    source,
  })?;

  let mut snapshots = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|source| RetentionError::ReadDir {
      path: staging_dir.to_path_buf(),
      source,
    })?;

    if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
      continue;
    }

    let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<u64>().ok()) else {
      continue;
    };

    snapshots.push((id, entry.path()));
  }

  snapshots.sort_by_key(|(id, _)| *id);
  Ok(snapshots)
}

/// Remove the oldest snapshots until at most `max_staged` remain.
///
/// A `max_staged` of zero removes every snapshot. The first removal
/// failure aborts the prune; snapshots already removed stay removed.
pub fn prune(staging_dir: &Path, max_staged: usize) -> Result<PruneResult, RetentionError> {
  let mut snapshots = list_snapshots(staging_dir)?;

  let mut removed = Vec::new();
  let mut bytes_freed = 0u64;

  while snapshots.len() > max_staged {
    let (id, path) = snapshots.remove(0);
    let size = dir_size(&path);

    fs::remove_dir_all(&path).map_err(|source| RetentionError::Remove {
      path: path.clone(),
      source,
    })?;

    debug!(id, path = %path.display(), "removed staging snapshot");
    bytes_freed += size;
    removed.push(path);
  }

  if !removed.is_empty() {
    info!(
      removed = removed.len(),
      bytes_freed,
      kept = snapshots.len(),
      "pruned staging snapshots"
    );
  }

  Ok(PruneResult { removed, bytes_freed })
}

fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}
