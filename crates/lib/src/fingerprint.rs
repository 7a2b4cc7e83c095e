//! Content-digest comparison between the repository artifact and the
//! locally cached tarball.
//!
//! The digests are lowercase-hex SHA-256. A cycle starts here: when both
//! sides agree the deploy is skipped entirely.

use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::config::DeploymentConfig;
use crate::repo::{ArtifactRepository, TransferError};

#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error("failed to read {path}: {source}")]
  ReadLocal {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("remote digest lookup failed: {0}")]
  Remote(#[from] TransferError),
}

/// Compare the repository artifact's digest against the cached tarball.
///
/// Returns `true` only when both digests exist and are equal. A repository
/// with no matching artifact yields `false` (nothing to compare against);
/// a missing local tarball is an error the caller decides how to treat.
pub async fn compare<R: ArtifactRepository>(repo: &R, config: &DeploymentConfig) -> Result<bool, FingerprintError> {
  let remote = repo.search(&config.repo_path).await?;

  let Some(remote) = remote else {
    debug!(pattern = %config.repo_path, "no remote digest, treating as changed");
    return Ok(false);
  };

  let local = hash_file(&config.tarball_path())?;

  debug!(remote = %remote, local = %local, "compared content digests");
  Ok(remote.eq_ignore_ascii_case(&local))
}

/// SHA-256 of a file's contents as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String, FingerprintError> {
  let mut file = std::fs::File::open(path).map_err(|source| FingerprintError::ReadLocal {
    path: path.to_path_buf(),
    source,
  })?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|source| FingerprintError::ReadLocal {
      path: path.to_path_buf(),
      source,
    })?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}
