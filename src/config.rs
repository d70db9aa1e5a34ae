use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::DataDir;

pub const DATA_DIR_ENV: &str = "DESKBOARD_DATA_DIR";

/// Optional user settings read from `config.yml`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Default tracing filter when `RUST_LOG` is unset, e.g. `info`.
    pub log_level: Option<String>,
    /// Where attachments are staged before opening; defaults to the system
    /// temp directory.
    pub temp_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "deskboard").map(|dirs| dirs.config_dir().join("config.yml"))
    }

    /// Loads the config at the default location; a missing file yields the
    /// defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(AppConfig::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        if data.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        let config: AppConfig =
            serde_yaml::from_str(&data).with_context(|| format!("parsing {:?}", path))?;
        Ok(config)
    }

    /// Data directory by precedence: flag, environment, config file,
    /// platform default.
    pub fn resolve_data_dir(&self, flag: Option<PathBuf>) -> Result<DataDir> {
        let from_env = env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        self.resolve_data_dir_with(flag, from_env)
    }

    pub fn resolve_data_dir_with(&self, flag: Option<PathBuf>, from_env: Option<PathBuf>) -> Result<DataDir> {
        let root = flag
            .or(from_env)
            .or_else(|| self.data_dir.clone())
            .or_else(DataDir::platform_default)
            .context("locating data directory")?;
        Ok(DataDir::new(root))
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn missing_or_blank_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());
        fs::write(&path, "\n").unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn reads_yaml_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "data_dir: /srv/boards\nlog_level: debug\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.data_dir.as_deref(), Some(Path::new("/srv/boards")));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "data_dir: [unterminated").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn data_dir_precedence() {
        let config = AppConfig {
            data_dir: Some("/from/config".into()),
            ..AppConfig::default()
        };
        let flag = Some(PathBuf::from("/from/flag"));
        let env = Some(PathBuf::from("/from/env"));
        assert_eq!(
            config.resolve_data_dir_with(flag, env.clone()).unwrap().root(),
            Path::new("/from/flag")
        );
        assert_eq!(
            config.resolve_data_dir_with(None, env).unwrap().root(),
            Path::new("/from/env")
        );
        assert_eq!(
            config.resolve_data_dir_with(None, None).unwrap().root(),
            Path::new("/from/config")
        );
    }
}
