//! Artifact repository access.
//!
//! The orchestrator only sees the [`ArtifactRepository`] trait; the
//! HTTP-backed implementation lives in [`client`]. Test doubles implement
//! the trait with canned digests and locally written files.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod client;

pub use client::{CredentialConfig, HttpRepository, ServerEntry};

#[derive(Debug, Error)]
pub enum TransferError {
  #[error("failed to read credential config {path}: {source}")]
  CredentialsRead {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse credential config {path}: {source}")]
  CredentialsParse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("credential config {path} lists no servers")]
  NoServers { path: PathBuf },

  #[error("request to {url} failed: {source}")]
  Http {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("unexpected status {status} from {url}")]
  Status { status: reqwest::StatusCode, url: String },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Per-file outcome counts of a download request.
///
/// A transport-level failure is a [`TransferError`]; a server that answers
/// but declines the file is counted here instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
  pub succeeded: usize,
  pub failed: usize,
}

/// Remote artifact store the agent deploys from.
///
/// The production implementation talks to an Artifactory-style HTTP API;
/// test doubles serve digests and archives from local state.
#[allow(async_fn_in_trait)]
pub trait ArtifactRepository {
  /// Look up the content digest of the artifact matching `pattern`.
  ///
  /// Returns `Ok(None)` when the repository has no such artifact.
  async fn search(&self, pattern: &str) -> Result<Option<String>, TransferError>;

  /// Download the artifact matching `pattern` to `dest`.
  async fn download(&self, pattern: &str, dest: &Path) -> Result<TransferReport, TransferError>;
}
