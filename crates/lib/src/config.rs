//! Agent configuration.
//!
//! A [`DeploymentConfig`] is resolved once at startup from three layers,
//! lowest precedence first: built-in defaults, an optional YAML config file,
//! and explicit CLI overrides. The resolved value is immutable and passed
//! by reference to every component.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::paths::{DEFAULT_WORK_ROOT, WorkPaths};

/// Tarball name used when neither file nor flags set one.
pub const DEFAULT_TARBALL_NAME: &str = "ansible.tar.gz";

/// Namespace used when neither file nor flags set one.
pub const DEFAULT_NAMESPACE: &str = "ansible";

/// Staging snapshots kept by the retention policy by default.
pub const DEFAULT_MAX_STAGED: usize = 10;

/// Daemon cycle interval used when neither file nor flags set one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default location of the repository credential config.
const DEFAULT_CREDENTIALS_PATH: &str = "~/.jfrog/jfrog-cli.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("invalid interval {value:?}: {source}")]
  Interval {
    value: String,
    #[source]
    source: humantime::DurationError,
  },

  #[error("{field} must not be empty")]
  EmptyField { field: &'static str },
}

/// Resolved agent configuration, immutable after load.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
  /// Repository path pattern of the artifact, e.g.
  /// `releases/ansible/ansible.tar.gz`.
  pub repo_path: String,

  /// File name of the tarball in the local cache.
  pub tarball_name: String,

  /// Namespace the tarball is cached and extracted under.
  pub namespace: String,

  /// Staging snapshots to keep after a deploy.
  pub max_staged: usize,

  /// Interval between daemon cycles.
  pub interval: Duration,

  /// Path to the repository credential config (JSON).
  pub credentials_path: PathBuf,

  /// Working root holding tarballs, staging snapshots and the active link.
  pub work_root: PathBuf,

  /// Vault password file passed to the playbook run, if any.
  pub vault_password_file: Option<PathBuf>,
}

/// Raw shape of the YAML config file. Every field is optional; missing
/// fields fall through to defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
  repo_path: Option<String>,
  tarball_name: Option<String>,
  namespace: Option<String>,
  max_staged: Option<usize>,
  interval: Option<String>,
  credentials_path: Option<PathBuf>,
  work_root: Option<PathBuf>,
  vault_password_file: Option<PathBuf>,
}

/// Per-field CLI overrides, applied on top of file values.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
  pub repo_path: Option<String>,
  pub tarball_name: Option<String>,
  pub namespace: Option<String>,
  pub max_staged: Option<usize>,
  pub interval: Option<Duration>,
  pub credentials_path: Option<PathBuf>,
  pub work_root: Option<PathBuf>,
  pub vault_password_file: Option<PathBuf>,
}

impl DeploymentConfig {
  /// Resolve a config from defaults, an optional YAML file and CLI
  /// overrides, in that precedence order.
  pub fn resolve(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
    let file = match file {
      Some(path) => load_file(path)?,
      None => ConfigFile::default(),
    };

    let interval = match (overrides.interval, file.interval) {
      (Some(duration), _) => duration,
      (None, Some(value)) => {
        humantime::parse_duration(&value).map_err(|source| ConfigError::Interval { value, source })?
      }
      (None, None) => DEFAULT_INTERVAL,
    };

    let config = Self {
      repo_path: overrides.repo_path.or(file.repo_path).unwrap_or_default(),
      tarball_name: overrides
        .tarball_name
        .or(file.tarball_name)
        .unwrap_or_else(|| DEFAULT_TARBALL_NAME.to_string()),
      namespace: overrides
        .namespace
        .or(file.namespace)
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
      max_staged: overrides.max_staged.or(file.max_staged).unwrap_or(DEFAULT_MAX_STAGED),
      interval,
      credentials_path: expand_home(
        overrides
          .credentials_path
          .or(file.credentials_path)
          .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
      ),
      work_root: overrides
        .work_root
        .or(file.work_root)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_ROOT)),
      vault_password_file: overrides
        .vault_password_file
        .or(file.vault_password_file)
        .map(expand_home),
    };

    config.validate()?;
    Ok(config)
  }

  /// Filesystem layout rooted at the configured working root.
  pub fn work_paths(&self) -> WorkPaths {
    WorkPaths::new(&self.work_root)
  }

  /// Canonical path of the cached tarball for this config.
  pub fn tarball_path(&self) -> PathBuf {
    self.work_paths().tarball_path(&self.namespace, &self.tarball_name)
  }

  /// Check the fields a deploy cannot run without. Read-only commands
  /// (status) skip this, so a bare invocation can still inspect state.
  pub fn require_repo_path(&self) -> Result<(), ConfigError> {
    if self.repo_path.is_empty() {
      return Err(ConfigError::EmptyField { field: "repo_path" });
    }
    Ok(())
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.tarball_name.is_empty() {
      return Err(ConfigError::EmptyField { field: "tarball_name" });
    }
    if self.namespace.is_empty() {
      return Err(ConfigError::EmptyField { field: "namespace" });
    }
    Ok(())
  }
}

fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
  let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let file: ConfigFile = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source,
  })?;

  debug!(path = %path.display(), "loaded config file");
  Ok(file)
}

/// Replace a leading `~` component with the user's home directory.
///
/// Paths without the prefix (and paths on systems with no resolvable home)
/// pass through unchanged.
fn expand_home(path: PathBuf) -> PathBuf {
  let expanded = path
    .strip_prefix("~")
    .ok()
    .and_then(|rest| dirs::home_dir().map(|home| home.join(rest)));
  expanded.unwrap_or(path)
}
