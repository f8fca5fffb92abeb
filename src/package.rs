//! Package metadata types
//!
//! A package is a named, versioned plugin targeting an operating system and
//! CPU architecture. [`PackageDef`] is the unit repositories serve and the
//! resolver selects; [`PackageSpecifier`] is the constrained form found in
//! image documents.

use crate::version::VersionSpecifier;
use crate::{Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CPU architecture a package targets, or a host runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuArchitecture {
    /// No architecture stated. A host with an unspecified architecture
    /// accepts every package.
    #[default]
    Unspecified,
    /// Architecture-independent package.
    #[serde(alias = "AnyCPU")]
    AnyCpu,
    X86,
    X64,
    Arm,
    Arm64,
}

impl CpuArchitecture {
    /// Can a host of this architecture load the given package architecture?
    pub fn supports(self, package: CpuArchitecture) -> bool {
        package == CpuArchitecture::AnyCpu || self == CpuArchitecture::Unspecified || self == package
    }

    /// Can two packages of these architectures live in one installation?
    pub fn coexists_with(self, other: CpuArchitecture) -> bool {
        self == CpuArchitecture::AnyCpu || other == CpuArchitecture::AnyCpu || self == other
    }
}

impl FromStr for CpuArchitecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "unspecified" => Ok(CpuArchitecture::Unspecified),
            "anycpu" => Ok(CpuArchitecture::AnyCpu),
            "x86" => Ok(CpuArchitecture::X86),
            "x64" | "x86_64" | "amd64" => Ok(CpuArchitecture::X64),
            "arm" => Ok(CpuArchitecture::Arm),
            "arm64" | "aarch64" => Ok(CpuArchitecture::Arm64),
            other => Err(Error::Other(format!("Unknown CPU architecture: {}", other))),
        }
    }
}

impl fmt::Display for CpuArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CpuArchitecture::Unspecified => "unspecified",
            CpuArchitecture::AnyCpu => "anycpu",
            CpuArchitecture::X86 => "x86",
            CpuArchitecture::X64 => "x64",
            CpuArchitecture::Arm => "arm",
            CpuArchitecture::Arm64 => "arm64",
        };
        write!(f, "{}", name)
    }
}

/// Does a package's `os` field cover the target OS?
///
/// The field may carry a comma-separated list (`"windows,linux"`); matching
/// is per element and case-insensitive. An empty field matches every target.
pub fn os_matches(package_os: &str, target_os: &str) -> bool {
    if package_os.trim().is_empty() {
        return true;
    }
    package_os
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(target_os.trim()))
}

/// A package name plus a version constraint, as written in an image document
/// or produced by the merge engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpecifier {
    pub name: String,

    #[serde(default = "default_version_specifier")]
    pub version: VersionSpecifier,

    /// Per-package architecture override; `Unspecified` defers to the image.
    #[serde(default, skip_serializing_if = "is_unspecified")]
    pub architecture: CpuArchitecture,

    /// Per-package OS override; `None` defers to the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

fn is_unspecified(arch: &CpuArchitecture) -> bool {
    *arch == CpuArchitecture::Unspecified
}

fn default_version_specifier() -> VersionSpecifier {
    VersionSpecifier::AnyRelease
}

impl PackageSpecifier {
    pub fn new(name: impl Into<String>, version: VersionSpecifier) -> Self {
        Self {
            name: name.into(),
            version,
            architecture: CpuArchitecture::Unspecified,
            os: None,
        }
    }

    pub fn with_architecture(mut self, arch: CpuArchitecture) -> Self {
        self.architecture = arch;
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Parse the inline `name[:version]` form used in comma-separated image
    /// documents.
    pub fn parse_inline(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidImage("empty package specifier".to_string()));
        }
        match trimmed.split_once(':') {
            Some((name, version)) => Ok(Self::new(name.trim(), version.parse()?)),
            None => Ok(Self::new(trimmed, VersionSpecifier::AnyRelease)),
        }
    }
}

impl fmt::Display for PackageSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            VersionSpecifier::AnyRelease => write!(f, "{}", self.name),
            spec => write!(f, "{}:{}", self.name, spec),
        }
    }
}

/// The identity a repository serves a package under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: CpuArchitecture,
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A dependency edge: the depended-on package name and the accepted versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub name: String,
    pub version: VersionSpecifier,
}

impl PackageDependency {
    pub fn new(name: impl Into<String>, version: VersionSpecifier) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// A concrete package version as published: identity, dependency edges, and
/// the repository it was drawn from (absent for side-loaded definitions).
///
/// Two defs with equal identity are interchangeable; the dependency cache
/// keeps the one from the earliest repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDef {
    pub name: String,
    pub version: Version,

    /// Target OS, possibly a comma-separated list. Empty means any.
    #[serde(default)]
    pub os: String,

    #[serde(default)]
    pub architecture: CpuArchitecture,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageDependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repository: Option<String>,
}

impl PackageDef {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity {
            name: self.name.clone(),
            version: self.version.clone(),
            os: self.os.clone(),
            architecture: self.architecture,
        }
    }

    /// Is this def installable on the given target?
    pub fn is_compatible_with(&self, target_os: &str, target_arch: CpuArchitecture) -> bool {
        os_matches(&self.os, target_os) && target_arch.supports(self.architecture)
    }
}

impl fmt::Display for PackageDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_support_matrix() {
        use CpuArchitecture::*;

        assert!(X64.supports(AnyCpu));
        assert!(X64.supports(X64));
        assert!(!X64.supports(X86));
        assert!(Unspecified.supports(X86));
        assert!(Unspecified.supports(Arm64));
    }

    #[test]
    fn test_arch_coexistence() {
        use CpuArchitecture::*;

        assert!(AnyCpu.coexists_with(X64));
        assert!(X64.coexists_with(AnyCpu));
        assert!(X64.coexists_with(X64));
        assert!(!X64.coexists_with(X86));
        assert!(!Arm.coexists_with(Arm64));
    }

    #[test]
    fn test_arch_parse() {
        assert_eq!(
            "AnyCPU".parse::<CpuArchitecture>().unwrap(),
            CpuArchitecture::AnyCpu
        );
        assert_eq!(
            "x86_64".parse::<CpuArchitecture>().unwrap(),
            CpuArchitecture::X64
        );
        assert_eq!(
            "aarch64".parse::<CpuArchitecture>().unwrap(),
            CpuArchitecture::Arm64
        );
        assert!("mips".parse::<CpuArchitecture>().is_err());
    }

    #[test]
    fn test_os_matches() {
        assert!(os_matches("windows,linux", "Linux"));
        assert!(os_matches("Windows", "windows"));
        assert!(!os_matches("windows", "linux"));
        assert!(os_matches("", "linux"));
        assert!(os_matches(" windows , linux ", "linux"));
    }

    #[test]
    fn test_specifier_inline_parse() {
        let spec = PackageSpecifier::parse_inline("Demonstration:^9.0.0").unwrap();
        assert_eq!(spec.name, "Demonstration");
        assert_eq!(spec.version, "^9.0.0".parse().unwrap());

        let bare = PackageSpecifier::parse_inline("OpenTAP").unwrap();
        assert_eq!(bare.version, VersionSpecifier::AnyRelease);

        assert!(PackageSpecifier::parse_inline("  ").is_err());
    }

    #[test]
    fn test_def_serde_round_trip() {
        let json = r#"{
            "name": "Demonstration",
            "version": "9.1.0",
            "os": "windows,linux",
            "architecture": "anycpu",
            "dependencies": [
                { "name": "OpenTAP", "version": "^9.12.0" }
            ]
        }"#;

        let def: PackageDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.name, "Demonstration");
        assert_eq!(def.version, Version::new(9, 1, 0));
        assert_eq!(def.dependencies.len(), 1);
        assert_eq!(def.dependencies[0].name, "OpenTAP");

        let back = serde_json::to_string(&def).unwrap();
        let again: PackageDef = serde_json::from_str(&back).unwrap();
        assert_eq!(def, again);
    }

    #[test]
    fn test_def_compatibility() {
        let def = PackageDef {
            name: "Native".to_string(),
            version: Version::new(1, 0, 0),
            os: "linux".to_string(),
            architecture: CpuArchitecture::X86,
            dependencies: vec![],
            source_repository: None,
        };

        assert!(def.is_compatible_with("linux", CpuArchitecture::X86));
        assert!(def.is_compatible_with("Linux", CpuArchitecture::Unspecified));
        assert!(!def.is_compatible_with("windows", CpuArchitecture::X86));
        assert!(!def.is_compatible_with("linux", CpuArchitecture::X64));
    }
}
