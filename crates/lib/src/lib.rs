//! stagehand-lib: Core types and logic for Stagehand
//!
//! This crate implements the host-local deployment agent:
//! - `DeploymentConfig`: settings resolved from defaults, config file, and flags
//! - `deploy`: one cycle of fingerprint, download, stage, prune, activate
//! - `daemon`: single-flight runner and the interval scheduler around it
//! - `repo` / `tags` / `executor`: the artifact repository, host metadata,
//!   and playbook collaborators behind capability traits

pub mod activate;
pub mod config;
pub mod daemon;
pub mod deploy;
pub mod executor;
pub mod fingerprint;
pub mod paths;
pub mod repo;
pub mod retention;
pub mod stage;
pub mod tags;
