//! User configuration management
//!
//! Configuration lives in TOML format at `~/.rigpm/config.toml` and supplies
//! defaults the CLI flags and image documents can override: repositories to
//! consult, the default target, and resolver diagnostics settings.
//!
//! # Examples
//!
//! ```no_run
//! use rigpm::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! for repository in &config.repositories {
//!     println!("{}", repository);
//! }
//! # Ok(())
//! # }
//! ```

use crate::package::CpuArchitecture;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User configuration file (`~/.rigpm/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default repositories, in winning order.
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Default resolution target.
    #[serde(default)]
    pub target: TargetConfig,

    /// Resolver diagnostics settings.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Default OS name; the host OS when unset.
    #[serde(default)]
    pub os: Option<String>,

    /// Default CPU architecture; the host architecture when unset.
    #[serde(default)]
    pub architecture: Option<CpuArchitecture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Print every conflict encountered during the search, not just the
    /// final report.
    #[serde(default)]
    pub verbose_conflicts: bool,

    /// Write the Dot diagnostic graph to this file on resolution failure.
    #[serde(default)]
    pub diagnostic_graph_file: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            verbose_conflicts: false,
            diagnostic_graph_file: None,
        }
    }
}

impl Config {
    /// Get the config file path
    ///
    /// Uses RIGPM_CONFIG_DIR if set, otherwise ~/.rigpm/config.toml
    pub fn default_path() -> Result<PathBuf> {
        // Custom config directory, useful for testing
        if let Ok(config_dir) = std::env::var("RIGPM_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| Error::Other("Could not find home directory".to_string()))?;

        Ok(PathBuf::from(home).join(".rigpm").join("config.toml"))
    }

    /// Load config from file, or the defaults if it doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.repositories.is_empty());
        assert!(config.target.os.is_none());
        assert!(!config.resolver.verbose_conflicts);
    }

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
            repositories = ["https://packages.example.com"]

            [target]
            os = "linux"
            architecture = "x64"

            [resolver]
            verbose_conflicts = true
            "#,
        )
        .unwrap();

        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.target.os.as_deref(), Some("linux"));
        assert_eq!(config.target.architecture, Some(CpuArchitecture::X64));
        assert!(config.resolver.verbose_conflicts);
    }
}
