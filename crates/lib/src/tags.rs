//! Host tag discovery for the post-deploy run.
//!
//! Hosts carry provider tags; the playbook run is limited to the seed tag
//! plus the tags namespaced to this agent (`<namespace>-*`).

use thiserror::Error;
use tracing::debug;

/// Tag every post-deploy run starts with.
pub const BASE_TAG: &str = "base";

/// Cloud metadata endpoint serving the host's tags.
pub const METADATA_BASE_URL: &str = "http://169.254.169.254";

#[derive(Debug, Error)]
pub enum TagError {
  #[error("request to {url} failed: {source}")]
  Http {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("unexpected status {status} from {url}")]
  Status { status: reqwest::StatusCode, url: String },
}

/// Source of the host tags steering the post-deploy run.
#[allow(async_fn_in_trait)]
pub trait TagDiscovery {
  /// The seed tag followed by this host's namespaced tags.
  async fn discover_tags(&self) -> Result<Vec<String>, TagError>;
}

/// Tag discovery backed by the cloud metadata service.
#[derive(Debug, Clone)]
pub struct MetadataService {
  client: reqwest::Client,
  base_url: String,
  namespace: String,
}

impl MetadataService {
  pub fn new(namespace: impl Into<String>) -> Self {
    Self::with_base_url(METADATA_BASE_URL, namespace)
  }

  pub fn with_base_url(base_url: impl Into<String>, namespace: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: base_url.into().trim_end_matches('/').to_string(),
      namespace: namespace.into(),
    }
  }
}

impl TagDiscovery for MetadataService {
  async fn discover_tags(&self) -> Result<Vec<String>, TagError> {
    let url = format!("{}/metadata/v1/tags", self.base_url);

    let response = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|source| TagError::Http { url: url.clone(), source })?;

    if !response.status().is_success() {
      return Err(TagError::Status {
        status: response.status(),
        url,
      });
    }

    let body = response.text().await.map_err(|source| TagError::Http { url, source })?;

    let tags = filter_tags(&body, &self.namespace);
    debug!(tags = ?tags, "discovered host tags");
    Ok(tags)
  }
}

/// Filter the newline-separated host tags down to `<namespace>-*`,
/// seeded with [`BASE_TAG`].
fn filter_tags(body: &str, namespace: &str) -> Vec<String> {
  let prefix = format!("{namespace}-");
  let mut tags = vec![BASE_TAG.to_string()];

  for line in body.lines() {
    let tag = line.trim();
    if tag.starts_with(&prefix) {
      tags.push(tag.to_string());
    }
  }

  tags
}
