//! Implementation of the `stagehand daemon` command.
//!
//! Deploys on the configured interval until the process is killed. Cycle
//! and post-deploy failures are logged and the schedule continues; only
//! startup problems are fatal.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use stagehand_lib::config::DeploymentConfig;
use stagehand_lib::daemon::{self, AgentRunner};

/// Execute the daemon command. Blocks for the life of the process.
pub fn cmd_daemon(config: DeploymentConfig) -> Result<()> {
  config.require_repo_path()?;

  if config.interval.is_zero() {
    bail!("daemon interval must be positive");
  }

  config
    .work_paths()
    .ensure_layout()
    .context("Failed to create working directory layout")?;
  info!(work_root = %config.work_root.display(), "daemon starting");

  let interval = config.interval;
  let runner = Arc::new(AgentRunner::from_config(config).context("Failed to build runner")?);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(daemon::run_daemon(runner, interval));

  Ok(())
}
