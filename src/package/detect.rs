//! Package presence detection.
//!
//! Asks the remote host which version of the support package is installed
//! and compares it against the requirement. Transport failures propagate —
//! "cannot ask" is never reported as "not installed".

use crate::error::{Result, SherpaError};
use crate::remote::{resolve_path, RemoteFileSystem, RemoteMachine};
use crate::version::Version;

use super::requirement::PackageRequirement;

/// Installation state of the package on one remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// Installed at an acceptable version.
    Present { version: Version },

    /// Not installed at all.
    Absent,

    /// Installed, but below the required minimum.
    Incompatible { installed: Version },
}

impl Presence {
    /// Whether the requirement is satisfied as-is.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Presence::Present { .. })
    }
}

/// Determine whether the required package is installed and current.
///
/// The version command is the primary probe. When it is unavailable
/// (non-zero exit, typically "command not found"), the manifest file is
/// consulted: missing manifest means [`Presence::Absent`], a readable one
/// supplies the version. Output that cannot be parsed is a `Detection`
/// error, not an absence.
pub fn detect(
    fs: &RemoteFileSystem,
    machine: &RemoteMachine<'_>,
    requirement: &PackageRequirement,
) -> Result<Presence> {
    let output = machine.run_shell(&requirement.version_command)?;
    if output.success() {
        let version = Version::extract(&output.stdout).ok_or_else(|| SherpaError::Detection {
            message: format!(
                "cannot parse a version from '{}' output: {:?}",
                requirement.version_command,
                output.stdout.trim()
            ),
        })?;
        return Ok(compare(version, requirement));
    }

    tracing::debug!(
        "version command unavailable (exit {}), falling back to manifest",
        output.exit_code
    );

    let manifest = resolve_path(machine, &requirement.manifest)?;
    if !fs.exists(&manifest)? {
        return Ok(Presence::Absent);
    }

    let bytes = fs.read(&manifest)?;
    let text = String::from_utf8_lossy(&bytes);
    let first_line = text.lines().next().unwrap_or("").trim();
    let version: Version = first_line.parse().map_err(|_| SherpaError::Detection {
        message: format!(
            "manifest {} does not contain a version: {:?}",
            manifest, first_line
        ),
    })?;

    Ok(compare(version, requirement))
}

fn compare(installed: Version, requirement: &PackageRequirement) -> Presence {
    if installed >= requirement.min_version {
        Presence::Present { version: installed }
    } else {
        Presence::Incompatible { installed }
    }
}
