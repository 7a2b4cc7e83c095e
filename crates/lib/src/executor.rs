//! Post-deploy execution.
//!
//! After a snapshot is activated the agent runs the configuration
//! management playbook shipped inside it, limited to the discovered host
//! tags. Child output is streamed line by line into the agent's log.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::DeploymentConfig;

const PLAYBOOK_COMMAND: &str = "ansible-playbook";
const PLAYBOOK_FILE: &str = "base.yaml";
const INVENTORY_FILE: &str = "inventory.yaml";

#[derive(Debug, Error)]
pub enum ExecutorError {
  #[error("failed to spawn {command}: {source}")]
  Spawn {
    command: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to wait for {command}: {source}")]
  Wait {
    command: String,
    #[source]
    source: io::Error,
  },

  #[error("{command} exited with code {code:?}")]
  Failed { command: String, code: Option<i32> },
}

/// Action run against the active snapshot after each deploy cycle.
#[allow(async_fn_in_trait)]
pub trait PostDeploy {
  async fn run(&self, active: &Path, tags: &[String]) -> Result<(), ExecutorError>;
}

/// Runs `ansible-playbook` on the playbook inside the active snapshot.
///
/// The invocation is
/// `ansible-playbook <active>/<namespace>/base.yaml -i <active>/<namespace>/inventory.yaml
/// [--vault-password-file <path>] --tags <tag,tag,...>`.
#[derive(Debug, Clone)]
pub struct AnsiblePlaybook {
  command: String,
  namespace: String,
  vault_password_file: Option<PathBuf>,
}

impl AnsiblePlaybook {
  pub fn new(config: &DeploymentConfig) -> Self {
    Self {
      command: PLAYBOOK_COMMAND.to_string(),
      namespace: config.namespace.clone(),
      vault_password_file: config.vault_password_file.clone(),
    }
  }

  /// Override the playbook binary. Tests point this at a stub script.
  pub fn with_command(mut self, command: impl Into<String>) -> Self {
    self.command = command.into();
    self
  }

  fn build_args(&self, active: &Path, tags: &[String]) -> Vec<String> {
    let playbook_dir = active.join(&self.namespace);

    let mut args = vec![
      playbook_dir.join(PLAYBOOK_FILE).display().to_string(),
      "-i".to_string(),
      playbook_dir.join(INVENTORY_FILE).display().to_string(),
    ];

    if let Some(vault) = &self.vault_password_file {
      args.push("--vault-password-file".to_string());
      args.push(vault.display().to_string());
    }

    args.push("--tags".to_string());
    args.push(tags.join(","));

    args
  }
}

impl PostDeploy for AnsiblePlaybook {
  async fn run(&self, active: &Path, tags: &[String]) -> Result<(), ExecutorError> {
    let args = self.build_args(active, tags);
    info!(command = %self.command, tags = %tags.join(","), "running playbook");

    let mut child = Command::new(&self.command)
      .args(&args)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|source| ExecutorError::Spawn {
        command: self.command.clone(),
        source,
      })?;

    if let Some(stdout) = child.stdout.take() {
      tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
          info!("playbook: {}", line);
        }
      });
    }

    if let Some(stderr) = child.stderr.take() {
      tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
          warn!("playbook: {}", line);
        }
      });
    }

    let status = child.wait().await.map_err(|source| ExecutorError::Wait {
      command: self.command.clone(),
      source,
    })?;

    if !status.success() {
      return Err(ExecutorError::Failed {
        command: self.command.clone(),
        code: status.code(),
      });
    }

    info!("playbook run complete");
    Ok(())
  }
}
