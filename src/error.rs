//! Error types for sherpa operations.
//!
//! This module defines [`SherpaError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - `Transport` covers anything that prevents talking to the remote host —
//!   it means "cannot determine state", never "package absent"
//! - `Detection` (malformed remote output) propagates exactly like a
//!   transport failure; it is never silently mapped to an absent package
//! - `Install` is terminal for the current check and marks the environment
//!   invalid
//! - Use `anyhow::Error` (via `SherpaError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sherpa operations.
#[derive(Debug, Error)]
pub enum SherpaError {
    /// The remote channel failed: refused, dropped, timed out, or auth failed.
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// A remote query completed but produced output we cannot interpret.
    #[error("Detection failed: {message}")]
    Detection { message: String },

    /// The install sequence failed on the remote host.
    #[error("Install of '{package}' failed: {message}")]
    Install { package: String, message: String },

    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidation { message: String },

    /// Referenced environment does not exist in the registry.
    #[error("Unknown environment: {name}")]
    UnknownEnvironment { name: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SherpaError {
    /// Build a transport error from any displayable cause.
    pub fn transport(message: impl Into<String>) -> Self {
        SherpaError::Transport {
            message: message.into(),
        }
    }

    /// Whether this failure means "cannot determine remote state".
    ///
    /// Transport and detection failures must leave prior validity state
    /// untouched; everything else is allowed to settle it.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            SherpaError::Transport { .. } | SherpaError::Detection { .. }
        )
    }
}

impl From<ssh2::Error> for SherpaError {
    fn from(err: ssh2::Error) -> Self {
        SherpaError::Transport {
            message: err.to_string(),
        }
    }
}

/// Result type alias for sherpa operations.
pub type Result<T> = std::result::Result<T, SherpaError>;
