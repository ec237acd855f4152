//! Shell command execution on the remote host.

use crate::error::{Result, SherpaError};
use crate::transport::{Channel, ExecOutput};

use super::HOME_QUERY;

/// Executes shell commands on one remote host.
///
/// Borrowed from a [`super::RemoteSession`]; lives no longer than the
/// channel it is bound to.
pub struct RemoteMachine<'a> {
    channel: &'a dyn Channel,
}

impl<'a> RemoteMachine<'a> {
    pub fn new(channel: &'a dyn Channel) -> Self {
        Self { channel }
    }

    /// Run a raw argv on the remote host.
    pub fn run(&self, argv: &[&str]) -> Result<ExecOutput> {
        self.channel.run_command(argv)
    }

    /// Run a shell command line through a login shell.
    ///
    /// A login shell picks up the user's PATH setup, which is where
    /// per-user tool installs usually live.
    pub fn run_shell(&self, command: &str) -> Result<ExecOutput> {
        self.channel.run_command(&["sh", "-lc", command])
    }

    /// The remote user's home directory.
    pub fn home_dir(&self) -> Result<String> {
        let output = self.run_shell(HOME_QUERY)?;
        if !output.success() {
            return Err(SherpaError::Detection {
                message: format!(
                    "cannot resolve remote home directory: {}",
                    output.error_excerpt()
                ),
            });
        }
        let home = output.stdout.trim().to_string();
        if home.is_empty() {
            return Err(SherpaError::Detection {
                message: "remote home directory query returned nothing".to_string(),
            });
        }
        Ok(home)
    }
}
