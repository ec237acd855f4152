//! Remote channel abstraction.
//!
//! A [`Channel`] is an authenticated session to one remote host, exposing
//! command execution and a file-transfer surface. Every operation can fail
//! with a `Transport` error, which callers must treat as "cannot determine
//! remote state" — never as "package absent".
//!
//! # Modules
//!
//! - [`ssh`] - `ssh2`-backed production transport
//! - [`mock`] - scripted in-memory transport for tests

pub mod mock;
pub mod ssh;

use crate::error::Result;
use crate::registry::EnvironmentDescriptor;

/// Result of executing a remote command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Remote exit code.
    pub exit_code: i32,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,
}

impl ExecOutput {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A short excerpt of stderr (falling back to stdout) for error messages.
    pub fn error_excerpt(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let mut excerpt: String = text.trim().chars().take(200).collect();
        if excerpt.len() < text.trim().len() {
            excerpt.push_str("...");
        }
        excerpt
    }
}

/// An open, authenticated session to one remote host.
pub trait Channel: Send + std::fmt::Debug {
    /// Execute a command and wait for it to finish.
    fn run_command(&self, argv: &[&str]) -> Result<ExecOutput>;

    /// Open a file-transfer session over this channel.
    fn file_transfer(&self) -> Result<Box<dyn FileTransfer>>;
}

/// File operations over an open channel.
pub trait FileTransfer: Send {
    /// Read an entire remote file.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or overwrite a remote file.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Whether a remote path exists.
    fn exists(&self, path: &str) -> Result<bool>;

    /// List the entries of a remote directory.
    fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Create a remote directory and any missing parents.
    fn mkdir_all(&self, path: &str) -> Result<()>;
}

/// Opens channels to environments.
pub trait ChannelFactory: Send + Sync {
    /// Open an authenticated channel to the descriptor's target.
    fn open(&self, descriptor: &EnvironmentDescriptor) -> Result<Box<dyn Channel>>;
}
