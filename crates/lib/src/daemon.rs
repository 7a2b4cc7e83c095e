//! Single-flight runner and interval scheduler.
//!
//! The daemon ticks on a fixed interval and spawns a run per tick. A run
//! holds a `tokio::sync::Mutex` for its whole duration; a tick that fires
//! while a previous run is still going is skipped instead of queued, so a
//! slow playbook never stacks up concurrent deploys.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::DeploymentConfig;
use crate::deploy::{self, DeployError, DeployOutcome};
use crate::executor::{AnsiblePlaybook, ExecutorError, PostDeploy};
use crate::repo::{ArtifactRepository, HttpRepository, TransferError};
use crate::tags::{MetadataService, TagDiscovery, TagError};

/// Runner wired to the production collaborators.
pub type AgentRunner = Runner<HttpRepository, MetadataService, AnsiblePlaybook>;

/// Whether a scheduled run actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  /// The run held the lock, deployed, and ran the post-deploy action.
  Completed,

  /// Another run was still in flight; this one did nothing.
  Skipped,
}

#[derive(Debug, Error)]
pub enum RunError {
  #[error("deploy failed: {0}")]
  Deploy(#[from] DeployError),

  #[error("tag discovery failed: {0}")]
  Tags(#[from] TagError),

  #[error("post-deploy failed: {0}")]
  PostDeploy(#[from] ExecutorError),
}

/// Owns the collaborators and serializes runs.
pub struct Runner<R, T, P> {
  config: DeploymentConfig,
  repo: R,
  tags: T,
  post_deploy: P,
  gate: Mutex<()>,
}

impl<R, T, P> Runner<R, T, P>
where
  R: ArtifactRepository,
  T: TagDiscovery,
  P: PostDeploy,
{
  pub fn new(config: DeploymentConfig, repo: R, tags: T, post_deploy: P) -> Self {
    Self {
      config,
      repo,
      tags,
      post_deploy,
      gate: Mutex::new(()),
    }
  }

  pub fn config(&self) -> &DeploymentConfig {
    &self.config
  }

  /// Deploy and then run the post-deploy action, stopping at the first
  /// error. One-shot commands use this so failures reach the exit code.
  pub async fn deploy_and_configure(&self) -> Result<DeployOutcome, RunError> {
    let outcome = deploy::run_cycle(&self.repo, &self.config).await?;
    self.configure().await?;
    Ok(outcome)
  }

  /// One scheduled run. Returns [`RunOutcome::Skipped`] without doing any
  /// work when a previous run still holds the lock.
  ///
  /// Stage failures are logged, not propagated: the post-deploy action is
  /// still attempted after a failed deploy, and the next tick gets a fresh
  /// start either way.
  pub async fn run_once(&self) -> RunOutcome {
    let _guard = match self.gate.try_lock() {
      Ok(guard) => guard,
      Err(_) => {
        warn!("deploy already in progress, skipping this run");
        return RunOutcome::Skipped;
      }
    };

    match deploy::run_cycle(&self.repo, &self.config).await {
      Ok(DeployOutcome::UpToDate) => {}
      Ok(DeployOutcome::Deployed { snapshot, .. }) => {
        info!(snapshot = %snapshot.display(), "deployed new snapshot");
      }
      Err(e) => {
        error!(error = %e, "deploy cycle failed");
      }
    }

    if let Err(e) = self.configure().await {
      error!(error = %e, "post-deploy failed");
    }

    RunOutcome::Completed
  }

  /// Discover tags and run the configuration-management step against the
  /// active snapshot. A tag lookup failure skips the run entirely.
  async fn configure(&self) -> Result<(), RunError> {
    let tags = self.tags.discover_tags().await?;
    let active = self.config.work_paths().active_link();
    self.post_deploy.run(&active, &tags).await?;
    Ok(())
  }
}

impl AgentRunner {
  /// Build a runner from resolved config alone, constructing the HTTP
  /// repository from the credential file on disk.
  pub fn from_config(config: DeploymentConfig) -> Result<Self, TransferError> {
    let repo = HttpRepository::from_credentials(&config.credentials_path)?;
    let tags = MetadataService::new(&config.namespace);
    let post_deploy = AnsiblePlaybook::new(&config);
    Ok(Self::new(config, repo, tags, post_deploy))
  }
}

/// Tick forever, spawning one run per tick. Never returns.
pub async fn run_daemon(runner: Arc<AgentRunner>, interval: Duration) {
  info!(interval = %humantime::format_duration(interval), "starting scheduler");

  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    ticker.tick().await;
    let runner = Arc::clone(&runner);
    tokio::spawn(async move {
      runner.run_once().await;
    });
  }
}
