//! Implementation of the `stagehand init` command.
//!
//! Sets up the working directory layout and performs a first full run:
//! deploy the current artifact, then run the post-deploy action against
//! it. Every failure is fatal here, unlike daemon mode.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::info;

use stagehand_lib::config::DeploymentConfig;
use stagehand_lib::daemon::AgentRunner;
use stagehand_lib::deploy::DeployOutcome;

use crate::output::symbols;

/// Execute the init command.
///
/// Creates the layout under the configured work root:
/// - `tarballs/` for the cached artifact per namespace
/// - `staging/` for extracted snapshots
/// - the `active` symlink lands once the first deploy does
///
/// Then runs one deploy cycle and the post-deploy action.
///
/// # Errors
///
/// Returns an error if the layout cannot be created or any part of the
/// first run fails.
pub fn cmd_init(config: DeploymentConfig) -> Result<()> {
  config.require_repo_path()?;

  let paths = config.work_paths();
  paths
    .ensure_layout()
    .context("Failed to create working directory layout")?;
  info!(root = %paths.root().display(), "working directory layout ready");

  println!(
    "{} {}",
    symbols::SUCCESS.green(),
    "Initialized working directory".green().bold()
  );
  println!();
  println!("  {} Root:     {}", symbols::INFO.cyan(), paths.root().display());
  println!("  {} Tarballs: {}", symbols::INFO.cyan(), paths.tarball_dir().display());
  println!("  {} Staging:  {}", symbols::INFO.cyan(), paths.staging_dir().display());
  println!("  {} Active:   {}", symbols::INFO.cyan(), paths.active_link().display());
  println!();

  let runner = AgentRunner::from_config(config).context("Failed to build runner")?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(runner.deploy_and_configure())
    .context("First deploy failed")?;

  match outcome {
    DeployOutcome::UpToDate => println!("Artifact already current; nothing deployed."),
    DeployOutcome::Deployed { snapshot, .. } => {
      println!(
        "{} Deployed {}",
        symbols::SUCCESS.green(),
        snapshot.display().to_string().cyan()
      );
    }
  }

  Ok(())
}
