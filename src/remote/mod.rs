//! Adapters over an open remote channel.
//!
//! # Modules
//!
//! - [`fs`] - file-system operations over the channel's transfer session
//! - [`machine`] - shell command execution on the remote host
//! - [`session`] - per-check bundle owning the channel

pub mod fs;
pub mod machine;
pub mod session;

pub use fs::RemoteFileSystem;
pub use machine::RemoteMachine;
pub use session::RemoteSession;

/// Shell query the machine adapter uses to resolve the remote home directory.
pub const HOME_QUERY: &str = r#"printf %s "$HOME""#;

/// Resolve a configured remote path, expanding `~` against the remote home.
///
/// Queries the home directory only when the path actually needs it.
pub fn resolve_path(machine: &RemoteMachine<'_>, path: &str) -> crate::error::Result<String> {
    if path.starts_with('~') {
        Ok(expand_home(path, &machine.home_dir()?))
    } else {
        Ok(path.to_string())
    }
}

/// Expand a leading `~` against the remote home directory.
///
/// SFTP has no tilde expansion, so any configured path like
/// `~/.sherpa-agent` must be resolved before it reaches the transfer layer.
pub fn expand_home(path: &str, home: &str) -> String {
    if path == "~" {
        home.to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("{}/{}", home.trim_end_matches('/'), rest)
    } else {
        path.to_string()
    }
}
