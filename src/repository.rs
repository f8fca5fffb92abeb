//! Package repository clients
//!
//! A repository serves package indexes by name and hands out concrete
//! [`PackageDef`]s. Two variants exist behind one enum: a directory of JSON
//! indexes on disk, and an HTTP registry. Callers pass repositories in the
//! order that should win de-duplication; the clients themselves never make
//! cross-repository decisions.
//!
//! # Examples
//!
//! ```no_run
//! use rigpm::{CpuArchitecture, Repository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Repository::connect("/var/lib/rigpm-repo")?;
//! for entry in repo.list_versions("OpenTAP", "linux", CpuArchitecture::X64)? {
//!     println!("{}", entry.identity());
//! }
//! # Ok(())
//! # }
//! ```

use crate::package::{CpuArchitecture, PackageDef, PackageDependency, PackageIdentity};
use crate::repository_http::HttpRepository;
use crate::{Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Per-package index document served by a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIndex {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub versions: Vec<PackageRecord>,
}

/// One published version inside a [`PackageIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub version: Version,

    /// Target OS, possibly comma-separated. Empty means any.
    #[serde(default)]
    pub os: String,

    #[serde(default)]
    pub architecture: CpuArchitecture,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageDependency>,
}

impl PackageIndex {
    /// Expand a record into a full definition carrying the repository URL.
    pub fn definition(&self, record: &PackageRecord, source: &str) -> PackageDef {
        PackageDef {
            name: self.name.clone(),
            version: record.version.clone(),
            os: record.os.clone(),
            architecture: record.architecture,
            dependencies: record.dependencies.clone(),
            source_repository: Some(source.to_string()),
        }
    }
}

/// A candidate returned by [`Repository::list_versions`]. Holds enough to
/// materialize the definition without a second round-trip.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    def: PackageDef,
}

impl PackageEntry {
    pub(crate) fn new(def: PackageDef) -> Self {
        Self { def }
    }

    pub fn version(&self) -> &Version {
        &self.def.version
    }

    pub fn identity(&self) -> PackageIdentity {
        self.def.identity()
    }

    pub(crate) fn def(&self) -> &PackageDef {
        &self.def
    }
}

pub enum Repository {
    File(FileRepository),
    Http(HttpRepository),
}

impl Repository {
    /// Open a repository from a location string: `http(s)://` URLs become
    /// HTTP clients, everything else is treated as a directory path.
    pub fn connect(location: &str) -> Result<Self> {
        if let Ok(parsed) = Url::parse(location) {
            match parsed.scheme() {
                "http" | "https" => return Ok(Repository::Http(HttpRepository::new(location)?)),
                "file" => {
                    let path = parsed
                        .to_file_path()
                        .map_err(|_| Error::Other(format!("Invalid file URL: {}", location)))?;
                    return Ok(Repository::File(FileRepository::new(path)));
                }
                _ => {}
            }
        }
        Ok(Repository::File(FileRepository::new(location)))
    }

    /// The location string candidates from this repository are attributed to.
    pub fn url(&self) -> &str {
        match self {
            Repository::File(repo) => repo.url(),
            Repository::Http(repo) => repo.url(),
        }
    }

    /// Candidate versions of `name` compatible with the target OS and
    /// architecture, in the repository's own order.
    pub fn list_versions(
        &self,
        name: &str,
        target_os: &str,
        target_arch: CpuArchitecture,
    ) -> Result<Vec<PackageEntry>> {
        match self {
            Repository::File(repo) => repo.list_versions(name, target_os, target_arch),
            Repository::Http(repo) => repo.list_versions(name, target_os, target_arch),
        }
    }

    /// Every published version of `name` regardless of target. The dependency
    /// cache filters these itself so it can tell "unknown package" apart from
    /// "no compatible variant".
    pub fn list_all_versions(&self, name: &str) -> Result<Vec<PackageEntry>> {
        match self {
            Repository::File(repo) => repo.list_all_versions(name),
            Repository::Http(repo) => repo.list_all_versions(name),
        }
    }

    /// Materialize the definition behind an entry.
    pub fn get_definition(&self, entry: &PackageEntry) -> Result<PackageDef> {
        Ok(entry.def.clone())
    }

    /// Every package name the repository knows. Used for diagnostics only.
    pub fn names(&self) -> Result<Vec<String>> {
        match self {
            Repository::File(repo) => repo.names(),
            Repository::Http(repo) => repo.names(),
        }
    }
}

/// Directory-backed repository: `<root>/packages/<name>.json` per package.
pub struct FileRepository {
    root: PathBuf,
    location: String,
}

impl FileRepository {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let location = root.to_string_lossy().into_owned();
        Self { root, location }
    }

    pub fn url(&self) -> &str {
        &self.location
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.root.join("packages").join(format!("{}.json", name))
    }

    fn read_index(&self, name: &str) -> Result<Option<PackageIndex>> {
        let path = self.index_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::Repository {
            url: self.location.clone(),
            message: format!("cannot read {}: {}", path.display(), e),
            transient: false,
        })?;
        let index = serde_json::from_str(&content).map_err(|e| Error::Repository {
            url: self.location.clone(),
            message: format!("malformed index {}: {}", path.display(), e),
            transient: false,
        })?;
        Ok(Some(index))
    }

    pub fn list_versions(
        &self,
        name: &str,
        target_os: &str,
        target_arch: CpuArchitecture,
    ) -> Result<Vec<PackageEntry>> {
        let mut entries = self.list_all_versions(name)?;
        entries.retain(|entry| entry.def().is_compatible_with(target_os, target_arch));
        Ok(entries)
    }

    pub fn list_all_versions(&self, name: &str) -> Result<Vec<PackageEntry>> {
        let Some(index) = self.read_index(name)? else {
            return Ok(Vec::new());
        };

        Ok(index
            .versions
            .iter()
            .map(|record| index.definition(record, &self.location))
            .map(PackageEntry::new)
            .collect())
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let packages_dir = self.root.join("packages");
        if !packages_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&packages_dir).map_err(|e| Error::Repository {
            url: self.location.clone(),
            message: format!("cannot list {}: {}", packages_dir.display(), e),
            transient: false,
        })? {
            let entry = entry.map_err(|e| Error::Repository {
                url: self.location.clone(),
                message: e.to_string(),
                transient: false,
            })?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Write an index document. Test fixtures and repository tooling use
    /// this; the resolver itself never mutates a repository.
    pub fn write_index(&self, index: &PackageIndex) -> Result<()> {
        let packages_dir = self.root.join("packages");
        fs::create_dir_all(&packages_dir)?;
        let content = serde_json::to_string_pretty(index)?;
        fs::write(self.index_path(&index.name), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionSpecifier;
    use tempfile::TempDir;

    fn sample_index() -> PackageIndex {
        PackageIndex {
            name: "OpenTAP".to_string(),
            description: Some("Test automation runtime".to_string()),
            versions: vec![
                PackageRecord {
                    version: Version::new(9, 13, 1),
                    os: "windows,linux".to_string(),
                    architecture: CpuArchitecture::X64,
                    dependencies: vec![],
                },
                PackageRecord {
                    version: Version::new(9, 14, 0),
                    os: "windows".to_string(),
                    architecture: CpuArchitecture::X64,
                    dependencies: vec![PackageDependency::new(
                        "Runtime",
                        "^1.0.0".parse::<VersionSpecifier>().unwrap(),
                    )],
                },
            ],
        }
    }

    #[test]
    fn test_file_repository_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.write_index(&sample_index()).unwrap();

        let entries = repo
            .list_versions("OpenTAP", "linux", CpuArchitecture::X64)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version(), &Version::new(9, 13, 1));

        let both = repo
            .list_versions("OpenTAP", "windows", CpuArchitecture::X64)
            .unwrap();
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_file_repository_arch_filter() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.write_index(&sample_index()).unwrap();

        let entries = repo
            .list_versions("OpenTAP", "windows", CpuArchitecture::Arm64)
            .unwrap();
        assert!(entries.is_empty());

        // An unspecified host accepts everything.
        let entries = repo
            .list_versions("OpenTAP", "windows", CpuArchitecture::Unspecified)
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_unknown_package_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());

        let entries = repo
            .list_versions("Nope", "linux", CpuArchitecture::X64)
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.write_index(&sample_index()).unwrap();
        repo.write_index(&PackageIndex {
            name: "Demonstration".to_string(),
            description: None,
            versions: vec![],
        })
        .unwrap();

        assert_eq!(repo.names().unwrap(), vec!["Demonstration", "OpenTAP"]);
    }

    #[test]
    fn test_malformed_index_is_permanent_error() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::new(dir.path());
        std::fs::create_dir_all(dir.path().join("packages")).unwrap();
        std::fs::write(dir.path().join("packages/Broken.json"), "{ not json").unwrap();

        let err = repo
            .list_versions("Broken", "linux", CpuArchitecture::X64)
            .unwrap_err();
        match err {
            Error::Repository { transient, .. } => assert!(!transient),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_connect_dispatch() {
        assert!(matches!(
            Repository::connect("https://packages.example.com").unwrap(),
            Repository::Http(_)
        ));
        assert!(matches!(
            Repository::connect("/var/lib/repo").unwrap(),
            Repository::File(_)
        ));
    }
}
