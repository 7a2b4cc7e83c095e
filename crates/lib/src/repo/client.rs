//! HTTP implementation of [`ArtifactRepository`] for Artifactory-style
//! stores, plus loading of the CLI-compatible credential config.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{ArtifactRepository, TransferError, TransferReport};

/// One server block of the credential config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
  #[serde(default)]
  pub server_id: String,

  #[serde(default)]
  pub url: String,

  /// Base URL of the artifact API. Falls back to `url` when empty.
  #[serde(default)]
  pub artifactory_url: String,

  #[serde(default)]
  pub user: String,

  #[serde(default)]
  pub access_token: String,

  #[serde(default)]
  pub password: Option<String>,

  #[serde(default)]
  pub is_default: bool,
}

impl ServerEntry {
  fn base_url(&self) -> &str {
    if self.artifactory_url.is_empty() {
      &self.url
    } else {
      &self.artifactory_url
    }
  }
}

/// JSON shape of the repository CLI's config file, usually at
/// `~/.jfrog/jfrog-cli.conf`.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
  pub servers: Vec<ServerEntry>,

  #[serde(default)]
  pub version: String,
}

impl CredentialConfig {
  pub fn load(path: &Path) -> Result<Self, TransferError> {
    let content = fs::read_to_string(path).map_err(|source| TransferError::CredentialsRead {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&content).map_err(|source| TransferError::CredentialsParse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// The server marked `isDefault`, or the first one listed.
  pub fn default_server(&self) -> Option<&ServerEntry> {
    self.servers.iter().find(|s| s.is_default).or_else(|| self.servers.first())
  }
}

/// Artifact repository reached over HTTP.
///
/// `search` reads the store's metadata API for an artifact's SHA-256;
/// `download` fetches the artifact body itself.
#[derive(Debug, Clone)]
pub struct HttpRepository {
  client: reqwest::Client,
  base_url: String,
  user: String,
  access_token: String,
  password: Option<String>,
}

impl HttpRepository {
  pub fn new(base_url: impl Into<String>, user: impl Into<String>, access_token: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: base_url.into().trim_end_matches('/').to_string(),
      user: user.into(),
      access_token: access_token.into(),
      password: None,
    }
  }

  pub fn from_server(server: &ServerEntry) -> Self {
    let mut repo = Self::new(server.base_url(), server.user.clone(), server.access_token.clone());
    repo.password = server.password.clone();
    repo
  }

  /// Build a repository from the credential config at `path`, using its
  /// default server.
  pub fn from_credentials(path: &Path) -> Result<Self, TransferError> {
    let config = CredentialConfig::load(path)?;
    let server = config.default_server().ok_or_else(|| TransferError::NoServers {
      path: path.to_path_buf(),
    })?;

    debug!(server_id = %server.server_id, url = %server.base_url(), "using repository server");
    Ok(Self::from_server(server))
  }

  fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.access_token.is_empty() {
      request.basic_auth(&self.user, self.password.as_deref())
    } else {
      request.bearer_auth(&self.access_token)
    }
  }
}

/// Subset of the storage API's metadata response.
#[derive(Debug, Deserialize)]
struct StorageEntry {
  checksums: Option<StorageChecksums>,
}

#[derive(Debug, Deserialize)]
struct StorageChecksums {
  sha256: Option<String>,
}

impl ArtifactRepository for HttpRepository {
  async fn search(&self, pattern: &str) -> Result<Option<String>, TransferError> {
    let url = format!("{}/api/storage/{}", self.base_url, pattern);

    let response = self
      .authorize(self.client.get(&url))
      .send()
      .await
      .map_err(|source| TransferError::Http { url: url.clone(), source })?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
      debug!(pattern, "artifact not found in repository");
      return Ok(None);
    }

    if !response.status().is_success() {
      return Err(TransferError::Status {
        status: response.status(),
        url,
      });
    }

    let entry: StorageEntry = response
      .json()
      .await
      .map_err(|source| TransferError::Http { url, source })?;

    let digest = entry
      .checksums
      .and_then(|c| c.sha256)
      .map(|d| d.to_lowercase());

    debug!(pattern, digest = ?digest, "repository digest lookup complete");
    Ok(digest)
  }

  async fn download(&self, pattern: &str, dest: &Path) -> Result<TransferReport, TransferError> {
    let url = format!("{}/{}", self.base_url, pattern);
    info!(url = %url, "downloading artifact");

    let response = self
      .authorize(self.client.get(&url))
      .send()
      .await
      .map_err(|source| TransferError::Http { url: url.clone(), source })?;

    if !response.status().is_success() {
      warn!(url = %url, status = %response.status(), "artifact download refused");
      return Ok(TransferReport { succeeded: 0, failed: 1 });
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|source| TransferError::Http { url, source })?;

    if let Some(parent) = dest.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| TransferError::Write {
          path: parent.to_path_buf(),
          source,
        })?;
    }

    let mut file = tokio::fs::File::create(dest)
      .await
      .map_err(|source| TransferError::Write {
        path: dest.to_path_buf(),
        source,
      })?;
    file.write_all(&bytes).await.map_err(|source| TransferError::Write {
      path: dest.to_path_buf(),
      source,
    })?;
    file.flush().await.map_err(|source| TransferError::Write {
      path: dest.to_path_buf(),
      source,
    })?;

    info!(path = ?dest, size = bytes.len(), "download complete");
    Ok(TransferReport { succeeded: 1, failed: 0 })
  }
}
