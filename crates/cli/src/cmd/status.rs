//! Status command implementation.
//!
//! Displays the active snapshot, staged snapshot ids, and the cached
//! tarball digest. Reads state only; safe to run on an uninitialized
//! host, where everything simply reports as absent.

use anyhow::Result;

use stagehand_lib::activate;
use stagehand_lib::config::DeploymentConfig;
use stagehand_lib::fingerprint;
use stagehand_lib::retention;

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, symbols, truncate_hash};

pub fn cmd_status(config: &DeploymentConfig, output: OutputFormat) -> Result<()> {
  let paths = config.work_paths();

  let active = activate::current_target(&paths.active_link())?;

  let staging_dir = paths.staging_dir();
  let staged = if staging_dir.is_dir() {
    retention::list_snapshots(&staging_dir)?
  } else {
    Vec::new()
  };

  let tarball = config.tarball_path();
  let digest = if tarball.is_file() {
    Some(fingerprint::hash_file(&tarball)?)
  } else {
    None
  };

  if output.is_json() {
    let json_output = serde_json::json!({
      "active": active.as_ref().map(|p| p.display().to_string()),
      "staged": staged.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
      "tarball_digest": digest,
    });
    print_json(&json_output)?;
    return Ok(());
  }

  match &active {
    Some(target) => print_success(&format!("Active snapshot: {}", target.display())),
    None => print_info("No active snapshot. Run 'stagehand init' to deploy one."),
  }

  println!();
  print_stat("Staged snapshots", &staged.len().to_string());
  for (id, _) in &staged {
    println!("  {} {}", symbols::INFO, id);
  }

  println!();
  match &digest {
    Some(digest) => print_stat("Tarball digest", truncate_hash(digest)),
    None => print_stat("Tarball digest", "none"),
  }

  Ok(())
}
