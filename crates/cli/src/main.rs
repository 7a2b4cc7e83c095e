use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stagehand_lib::config::{ConfigOverrides, DeploymentConfig};

use crate::output::OutputFormat;

mod cmd;
mod output;

/// stagehand - Host-local deployment agent
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to a YAML config file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Repository path of the tarball to deploy
  #[arg(long, global = true)]
  repo_path: Option<String>,

  /// File name of the deployed tarball
  #[arg(long, global = true)]
  tarball_name: Option<String>,

  /// Namespace the tarball contents live under
  #[arg(long, global = true)]
  namespace: Option<String>,

  /// Maximum number of staged snapshots to keep
  #[arg(long, global = true)]
  max_staged: Option<usize>,

  /// Time between scheduled runs, e.g. 1m or 30s
  #[arg(long, global = true, value_parser = humantime::parse_duration)]
  interval: Option<Duration>,

  /// Path to the repository credential config
  #[arg(long, global = true)]
  credentials: Option<PathBuf>,

  /// Root of the agent's working directory
  #[arg(long, global = true)]
  work_root: Option<PathBuf>,

  /// Vault password file handed to the playbook run
  #[arg(long, global = true)]
  vault_password_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create the working layout and run a first deploy
  Init,

  /// Run one deploy cycle and exit
  Deploy,

  /// Deploy on a schedule until killed
  Daemon,

  /// Show the active snapshot and staging state
  Status {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

impl Cli {
  fn overrides(&self) -> ConfigOverrides {
    ConfigOverrides {
      repo_path: self.repo_path.clone(),
      tarball_name: self.tarball_name.clone(),
      namespace: self.namespace.clone(),
      max_staged: self.max_staged,
      interval: self.interval,
      credentials_path: self.credentials.clone(),
      work_root: self.work_root.clone(),
      vault_password_file: self.vault_password_file.clone(),
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();
  let config = DeploymentConfig::resolve(cli.config.as_deref(), cli.overrides())?;

  match cli.command {
    Commands::Init => cmd::cmd_init(config),
    Commands::Deploy => cmd::cmd_deploy(config),
    Commands::Daemon => cmd::cmd_daemon(config),
    Commands::Status { output } => cmd::cmd_status(&config, output),
  }
}
