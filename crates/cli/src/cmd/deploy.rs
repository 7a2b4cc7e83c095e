//! Implementation of the `stagehand deploy` command.
//!
//! Runs one deploy cycle and exits. The post-deploy action is not part of
//! this command; `init` and the daemon run it.

use std::time::Instant;

use anyhow::{Context, Result};

use stagehand_lib::config::DeploymentConfig;
use stagehand_lib::deploy::{self, DeployOutcome};
use stagehand_lib::repo::HttpRepository;

use crate::output::{format_duration, print_info, print_stat, print_success};

/// Execute the deploy command.
///
/// One cycle: compare fingerprints, download, stage, prune, activate.
/// Any failure is fatal to the process.
pub fn cmd_deploy(config: DeploymentConfig) -> Result<()> {
  config.require_repo_path()?;

  let start = Instant::now();

  config
    .work_paths()
    .ensure_layout()
    .context("Failed to create working directory layout")?;

  let repo = HttpRepository::from_credentials(&config.credentials_path)
    .context("Failed to load repository credentials")?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(deploy::run_cycle(&repo, &config))
    .context("Deploy failed")?;

  match outcome {
    DeployOutcome::UpToDate => print_info("Already up to date"),
    DeployOutcome::Deployed { snapshot, pruned } => {
      print_success("Deploy complete!");
      print_stat("Snapshot", &snapshot.display().to_string());
      print_stat("Pruned", &pruned.to_string());
      print_stat("Duration", &format_duration(start.elapsed()));
    }
  }

  Ok(())
}
