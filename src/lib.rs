//! Sherpa - Remote environment provisioning checks.
//!
//! Sherpa makes sure every configured remote execution environment carries
//! the required support package: it connects over SSH, detects the installed
//! version, installs or upgrades when needed, and caches per-environment
//! validity so consumers can ask "is this environment usable?" without a
//! remote round-trip.
//!
//! # Modules
//!
//! - [`checker`] - orchestrates the connect → detect → install flow
//! - [`cli`] - command-line interface and argument parsing
//! - [`config`] - configuration loading, parsing, and validation
//! - [`diagnostics`] - scrubbed failure reports for unexpected errors
//! - [`error`] - error types and result aliases
//! - [`package`] - package requirement, payload, detection, installation
//! - [`registry`] - environment descriptors and registry
//! - [`remote`] - file-system and command adapters over an open channel
//! - [`transport`] - remote channel abstraction and SSH implementation
//! - [`validity`] - per-environment validity cache
//! - [`version`] - numeric version parsing and ordering
//!
//! # Example
//!
//! ```
//! use sherpa::registry::EnvironmentId;
//! use sherpa::validity::ValidityTracker;
//!
//! let tracker = ValidityTracker::new();
//! let env = EnvironmentId::new("build-box");
//!
//! // Environments are usable until a check proves otherwise.
//! assert!(tracker.is_valid(&env));
//! tracker.mark_invalid(&env);
//! assert!(!tracker.is_valid(&env));
//! ```

pub mod checker;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod package;
pub mod registry;
pub mod remote;
pub mod transport;
pub mod validity;
pub mod version;

pub use error::{Result, SherpaError};
