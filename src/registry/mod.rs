//! Environment registry and descriptors.
//!
//! The registry enumerates configured execution environments. The checker
//! only reads descriptors; their identity is the key for validity caching.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::schema::{EnvironmentConfig, SherpaConfig};
use crate::error::{Result, SherpaError};

/// Stable identity of an environment, used as the validity cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EnvironmentId(String);

impl EnvironmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to reach an environment.
#[derive(Debug, Clone)]
pub enum ConnectionTarget {
    /// The machine sherpa itself runs on. Never checked.
    Local,

    /// A host reachable over SSH.
    Ssh {
        host: String,
        port: u16,
        user: String,
        auth: SshAuth,
    },
}

/// SSH authentication method.
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// Authenticate through the running SSH agent.
    Agent,

    /// Password authentication.
    Password(String),

    /// Private key file, with optional passphrase.
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

/// One configured execution environment.
///
/// Owned by the registry; the core reads it and uses its identity as a
/// cache key, never mutating it.
#[derive(Debug, Clone)]
pub struct EnvironmentDescriptor {
    id: EnvironmentId,
    name: String,
    target: ConnectionTarget,
}

impl EnvironmentDescriptor {
    pub fn new(name: impl Into<String>, target: ConnectionTarget) -> Self {
        let name = name.into();
        Self {
            id: EnvironmentId::new(name.clone()),
            name,
            target,
        }
    }

    pub fn id(&self) -> &EnvironmentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Whether this descriptor points at a remote (non-local) target.
    pub fn is_remote(&self) -> bool {
        !matches!(self.target, ConnectionTarget::Local)
    }
}

/// Enumerates configured environments.
pub trait EnvironmentRegistry: Send + Sync {
    /// All configured environments, in a stable order.
    fn environments(&self) -> Vec<EnvironmentDescriptor>;

    /// Look up a single environment by name.
    fn find(&self, name: &str) -> Option<EnvironmentDescriptor> {
        self.environments().into_iter().find(|e| e.name() == name)
    }
}

/// Registry backed by the loaded configuration file.
#[derive(Debug)]
pub struct ConfigRegistry {
    descriptors: Vec<EnvironmentDescriptor>,
}

impl ConfigRegistry {
    /// Build descriptors from the configuration, sorted by name.
    pub fn from_config(config: &SherpaConfig) -> Result<Self> {
        let mut names: Vec<&String> = config.environments.keys().collect();
        names.sort();

        let mut descriptors = Vec::with_capacity(names.len());
        for name in names {
            descriptors.push(descriptor_from_config(name, &config.environments[name])?);
        }

        Ok(Self { descriptors })
    }
}

impl EnvironmentRegistry for ConfigRegistry {
    fn environments(&self) -> Vec<EnvironmentDescriptor> {
        self.descriptors.clone()
    }
}

fn descriptor_from_config(name: &str, env: &EnvironmentConfig) -> Result<EnvironmentDescriptor> {
    if env.local {
        return Ok(EnvironmentDescriptor::new(name, ConnectionTarget::Local));
    }

    let host = env
        .host
        .clone()
        .ok_or_else(|| SherpaError::ConfigValidation {
            message: format!("environment '{}' is remote but has no host", name),
        })?;
    let user = env
        .user
        .clone()
        .ok_or_else(|| SherpaError::ConfigValidation {
            message: format!("environment '{}' is remote but has no user", name),
        })?;

    let auth = if let Some(path) = &env.auth.key_file {
        SshAuth::KeyFile {
            path: path.clone(),
            passphrase: env.auth.passphrase.clone(),
        }
    } else if let Some(password) = &env.auth.password {
        SshAuth::Password(password.clone())
    } else {
        SshAuth::Agent
    };

    Ok(EnvironmentDescriptor::new(
        name,
        ConnectionTarget::Ssh {
            host,
            port: env.port,
            user,
            auth,
        },
    ))
}
