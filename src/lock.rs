//! Resolved-image lock document
//!
//! `image install` records a successful resolution as `image.lock.json` in
//! the working directory: the concrete package set in deploy order, the
//! repositories it was drawn from, and a generation timestamp. The document
//! is the hand-off point to the deploy subsystem, and `--merge` reads it
//! back as the installed set.
//!
//! # Examples
//!
//! ```no_run
//! use rigpm::ImageLock;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! if let Some(lock) = ImageLock::load(".")? {
//!     println!("{} packages installed", lock.packages.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::image::ImageIdentifier;
use crate::package::{CpuArchitecture, PackageDef};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The lock document filename
pub const LOCK_FILE_NAME: &str = "image.lock.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageLock {
    /// rigpm version that generated this document
    pub rigpm_version: String,

    /// Generation timestamp (ISO 8601)
    pub generated_at: String,

    pub os: String,
    pub architecture: CpuArchitecture,

    #[serde(default)]
    pub repositories: Vec<String>,

    /// Resolved packages in deploy order (dependencies first)
    pub packages: Vec<PackageDef>,
}

impl ImageLock {
    /// Snapshot a resolved image for the given target.
    pub fn from_image(image: &ImageIdentifier, os: &str, architecture: CpuArchitecture) -> Self {
        Self {
            rigpm_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            os: os.to_string(),
            architecture,
            repositories: image.repositories().to_vec(),
            packages: image.packages().into_iter().cloned().collect(),
        }
    }

    /// Load the lock document from a directory, `None` when absent.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Option<Self>> {
        let path = dir.as_ref().join(LOCK_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(LOCK_FILE_NAME);
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        Ok(())
    }

    /// The recorded packages as installed definitions for a merge resolve.
    pub fn installed_packages(&self) -> Vec<PackageDef> {
        self.packages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let lock = ImageLock {
            rigpm_version: "0.0.0".to_string(),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            os: "linux".to_string(),
            architecture: CpuArchitecture::X64,
            repositories: vec!["https://packages.example.com".to_string()],
            packages: vec![PackageDef {
                name: "OpenTAP".to_string(),
                version: "9.14.0".parse().unwrap(),
                os: "linux".to_string(),
                architecture: CpuArchitecture::X64,
                dependencies: vec![],
                source_repository: Some("https://packages.example.com".to_string()),
            }],
        };

        lock.save(dir.path()).unwrap();
        let loaded = ImageLock::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.packages.len(), 1);
        assert_eq!(loaded.packages[0].name, "OpenTAP");
        assert_eq!(loaded.os, "linux");
    }

    #[test]
    fn test_missing_lock_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ImageLock::load(dir.path()).unwrap().is_none());
    }
}
