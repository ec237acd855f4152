//! Static description of the required support package.

use crate::config::schema::{PackageConfig, PayloadConfig};
use crate::error::{Result, SherpaError};
use crate::version::Version;

use super::payload::PayloadSource;

/// What must be present on every remote environment.
///
/// Loaded once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct PackageRequirement {
    /// Package name, used in logs and error messages.
    pub name: String,

    /// Minimum acceptable installed version.
    pub min_version: Version,

    /// Remote directory the payload is uploaded into.
    pub install_dir: String,

    /// Command that prints the installed version (exit 0 when installed).
    pub version_command: String,

    /// Command that performs the install after the payload is uploaded.
    pub install_command: String,

    /// Remote manifest file holding the installed version.
    pub manifest: String,

    /// Where the install payload comes from.
    pub payload: PayloadSource,
}

impl PackageRequirement {
    /// Build the requirement from configuration.
    pub fn from_config(config: &PackageConfig) -> Result<Self> {
        let min_version: Version =
            config
                .min_version
                .parse()
                .map_err(|_| SherpaError::ConfigValidation {
                    message: format!(
                        "package.min_version '{}' is not a valid version",
                        config.min_version
                    ),
                })?;

        let payload = match &config.payload {
            PayloadConfig::Embedded => PayloadSource::Embedded,
            PayloadConfig::File(path) => PayloadSource::File(path.clone()),
            PayloadConfig::Url(url) => PayloadSource::Url(url.clone()),
        };

        Ok(Self {
            name: config.name.clone(),
            min_version,
            install_dir: config.install_dir.clone(),
            version_command: config.version_command.clone(),
            install_command: config.install_command.clone(),
            manifest: config.manifest.clone(),
            payload,
        })
    }
}
