//! Package version parsing and ordering.
//!
//! Versions are `major[.minor[.patch]]` with numeric component-wise
//! comparison; missing components count as zero. Pre-release or build
//! suffixes after the numeric components are ignored.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SherpaError;

/// Matches the first version-shaped token in arbitrary command output.
static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("VERSION_REGEX must compile")
});

/// A numeric major.minor.patch version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Create a version from explicit components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Extract the first version-shaped token from command output.
    ///
    /// Tolerates prefixes like `v` and surrounding noise, e.g.
    /// `"sherpa-agent 2.1.0 (linux-x86_64)"` or `"v18.17.0"`.
    pub fn extract(text: &str) -> Option<Self> {
        let caps = VERSION_REGEX.captures(text)?;
        let component = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        Some(Self::new(component(1), component(2), component(3)))
    }
}

impl FromStr for Version {
    type Err = SherpaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        // Drop any pre-release/build suffix before splitting components.
        let numeric = trimmed.split(['-', '+']).next().unwrap_or("");
        if numeric.is_empty() {
            return Err(SherpaError::Detection {
                message: format!("empty version string '{}'", s),
            });
        }

        let parse = |component: Option<&str>| -> Result<u64, SherpaError> {
            match component {
                None | Some("") => Ok(0),
                Some(c) => c.parse().map_err(|_| SherpaError::Detection {
                    message: format!("invalid component '{}' in version '{}'", c, s),
                }),
            }
        };

        let mut components = numeric.split('.');
        let major = parse(components.next())?;
        let minor = parse(components.next())?;
        let patch = parse(components.next())?;

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
