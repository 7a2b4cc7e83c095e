mod daemon;
mod deploy;
mod init;
mod status;

pub use daemon::cmd_daemon;
pub use deploy::cmd_deploy;
pub use init::cmd_init;
pub use status::cmd_status;
