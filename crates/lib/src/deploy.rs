//! Deployment orchestration.
//!
//! One cycle runs the stages in order:
//!
//! 1. Compare content fingerprints (skip everything when they match)
//! 2. Download the tarball into the local cache
//! 3. Extract it into a fresh staging snapshot
//! 4. Prune old snapshots down to the retention bound
//! 5. Atomically activate the new snapshot
//!
//! The first failing stage aborts the cycle; nothing is retried or rolled
//! back. A failed fingerprint comparison is the one leniency: it is logged
//! and treated as a mismatch, so a missing or unreadable cache cannot wedge
//! the agent on its first run.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};

use crate::activate::{self, ActivationError};
use crate::config::DeploymentConfig;
use crate::fingerprint;
use crate::repo::{ArtifactRepository, TransferError};
use crate::retention::{self, RetentionError};
use crate::stage::{self, ExtractError};

/// What a single deploy cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
  /// Fingerprints matched; nothing was transferred or changed.
  UpToDate,

  /// A new snapshot was staged and activated.
  Deployed { snapshot: PathBuf, pruned: usize },
}

#[derive(Debug, Error)]
pub enum DeployError {
  #[error("transfer failed: {0}")]
  Transfer(#[from] TransferError),

  #[error("extraction failed: {0}")]
  Extract(#[from] ExtractError),

  #[error("retention failed: {0}")]
  Retention(#[from] RetentionError),

  #[error("activation failed: {0}")]
  Activation(#[from] ActivationError),
}

/// Run one deploy cycle against `repo`.
pub async fn run_cycle<R: ArtifactRepository>(
  repo: &R,
  config: &DeploymentConfig,
) -> Result<DeployOutcome, DeployError> {
  let paths = config.work_paths();

  let up_to_date = match fingerprint::compare(repo, config).await {
    Ok(matched) => matched,
    Err(e) => {
      error!(error = %e, "fingerprint comparison failed, deploying anyway");
      false
    }
  };

  if up_to_date {
    info!("content digests match, skipping deploy");
    return Ok(DeployOutcome::UpToDate);
  }

  let tarball = config.tarball_path();
  let report = repo.download(&config.repo_path, &tarball).await?;
  if report.failed > 0 {
    error!(failed = report.failed, "some downloads failed");
  }

  let snapshot = stage::stage_snapshot(&tarball, &paths.staging_dir())?;

  let pruned = retention::prune(&paths.staging_dir(), config.max_staged)?;

  activate::activate(&snapshot, &paths.active_link())?;

  info!(
    snapshot = %snapshot.display(),
    pruned = pruned.removed.len(),
    "deploy complete"
  );

  Ok(DeployOutcome::Deployed {
    snapshot,
    pruned: pruned.removed.len(),
  })
}
