//! Configuration file discovery and loading.
//!
//! Discovery order: an explicit `--config` path, then the project config at
//! `./.sherpa/config.yml`, then the user config at `~/.sherpa/config.yml`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::SherpaConfig;
use crate::error::{Result, SherpaError};

/// Relative path of the project config under the working directory.
const PROJECT_CONFIG: &str = ".sherpa/config.yml";

/// Find the config file to use, if any.
///
/// An explicit path is returned unconditionally so that a missing file
/// surfaces as `ConfigNotFound` naming the path the user asked for.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let project = PathBuf::from(PROJECT_CONFIG);
    if project.exists() {
        return Some(project);
    }

    let user = dirs::home_dir()?.join(PROJECT_CONFIG);
    if user.exists() {
        return Some(user);
    }

    None
}

/// Load and parse a config file.
pub fn load(path: &Path) -> Result<SherpaConfig> {
    let content = fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            SherpaError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            SherpaError::Io(err)
        }
    })?;

    serde_yaml::from_str(&content).map_err(|err| SherpaError::ConfigParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Discover and load the config, returning it with the path it came from.
pub fn resolve(explicit: Option<&Path>) -> Result<(SherpaConfig, PathBuf)> {
    let path = discover(explicit).ok_or_else(|| SherpaError::ConfigNotFound {
        path: PathBuf::from(PROJECT_CONFIG),
    })?;
    let config = load(&path)?;
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.yml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_valid_config() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "package:\n  min_version: \"1.2.3\"\n");

        let config = load(&path).unwrap();
        assert_eq!(config.package.min_version, "1.2.3");
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.yml");

        let err = load(&path).unwrap_err();
        assert!(matches!(err, SherpaError::ConfigNotFound { .. }));
        assert!(err.to_string().contains("nope.yml"));
    }

    #[test]
    fn load_malformed_yaml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "package: [not: a: mapping\n");

        let err = load(&path).unwrap_err();
        assert!(matches!(err, SherpaError::ConfigParse { .. }));
        assert!(err.to_string().contains("config.yml"));
    }

    #[test]
    fn discover_prefers_explicit_path_even_when_missing() {
        let explicit = PathBuf::from("/definitely/not/there.yml");
        let found = discover(Some(&explicit)).unwrap();
        assert_eq!(found, explicit);
    }

    #[test]
    fn resolve_explicit_missing_file_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.yml");

        let err = resolve(Some(&path)).unwrap_err();
        assert!(matches!(err, SherpaError::ConfigNotFound { .. }));
    }

    #[test]
    fn resolve_returns_config_and_source_path() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "settings:\n  connect_timeout_secs: 4\n");

        let (config, source) = resolve(Some(&path)).unwrap();
        assert_eq!(config.settings.connect_timeout_secs, 4);
        assert_eq!(source, path);
    }
}
