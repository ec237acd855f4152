//! Configuration schema definitions for sherpa.
//!
//! This module contains the struct definitions that map to the YAML
//! configuration file format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for `.sherpa/config.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SherpaConfig {
    /// The support package every remote environment must carry.
    pub package: PackageConfig,

    /// Global settings.
    pub settings: Settings,

    /// Configured execution environments, keyed by name.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,
}

/// Describes the required support package and how to install it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package name, used in logs and error messages.
    pub name: String,

    /// Minimum acceptable version (`major[.minor[.patch]]`).
    pub min_version: String,

    /// Remote directory the payload is uploaded into.
    pub install_dir: String,

    /// Command that prints the installed version (exit 0 when installed).
    pub version_command: String,

    /// Command that performs the install after the payload is uploaded.
    pub install_command: String,

    /// Remote manifest file holding the installed version, used as a
    /// fallback when the version command is unavailable.
    pub manifest: String,

    /// Where the install payload comes from.
    pub payload: PayloadConfig,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: "sherpa-agent".to_string(),
            min_version: env!("CARGO_PKG_VERSION").to_string(),
            install_dir: "~/.sherpa-agent".to_string(),
            version_command: "sherpa-agent --version".to_string(),
            install_command: "sh ~/.sherpa-agent/install.sh".to_string(),
            manifest: "~/.sherpa-agent/VERSION".to_string(),
            payload: PayloadConfig::Embedded,
        }
    }
}

/// Source of the install payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadConfig {
    /// The payload compiled into the sherpa binary.
    Embedded,

    /// A local file shipped as-is.
    File(PathBuf),

    /// A payload fetched over HTTP(S) at startup.
    Url(String),
}

/// Global settings that apply to all environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// One configured execution environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Local environments are listed but never checked.
    pub local: bool,

    /// SSH host. Required unless `local: true`.
    pub host: Option<String>,

    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// SSH user. Required unless `local: true`.
    pub user: Option<String>,

    /// Authentication settings. Defaults to the SSH agent.
    pub auth: AuthConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            local: false,
            host: None,
            port: default_port(),
            user: None,
            auth: AuthConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    22
}

/// SSH authentication settings.
///
/// Key file takes precedence over password; with neither set, the
/// SSH agent is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Password authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Private key file authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// Passphrase for the private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}
