//! Image document parsing
//!
//! The `image install` front-end accepts three interchangeable document
//! formats, auto-detected from the first non-whitespace character:
//!
//! - `<`          → XML (`<Image>` with `<Packages>`/`<Repositories>`)
//! - `[` or `{`   → JSON (an image object, or a bare package array)
//! - anything else → comma-separated `name[:version]` list
//!
//! All three deserialize into an [`ImageDocument`], which the caller
//! completes with target defaults and hands to the
//! [`ImageSpecifier`](crate::ImageSpecifier) builder.

use crate::package::{CpuArchitecture, PackageDef, PackageDependency, PackageSpecifier};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// The parsed form of an image document: roots plus optional repository list
/// and target, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageDocument {
    pub packages: Vec<PackageSpecifier>,
    pub repositories: Vec<String>,
    pub os: Option<String>,
    pub architecture: Option<CpuArchitecture>,
}

impl ImageDocument {
    /// Parse a document, auto-detecting its format.
    pub fn parse(content: &str) -> Result<Self> {
        let trimmed = content.trim_start();
        match trimmed.chars().next() {
            None => Err(Error::InvalidImage("empty image document".to_string())),
            Some('<') => Self::from_xml(content),
            Some('[') | Some('{') => Self::from_json(content),
            Some(_) => Self::from_inline(content),
        }
    }

    /// JSON: either a full image object or a bare array of packages.
    pub fn from_json(content: &str) -> Result<Self> {
        let parsed: JsonDocument = serde_json::from_str(content)?;
        Ok(match parsed {
            JsonDocument::Image(image) => ImageDocument {
                packages: image.packages,
                repositories: image.repositories,
                os: image.os,
                architecture: image.architecture,
            },
            JsonDocument::Packages(packages) => ImageDocument {
                packages,
                ..Default::default()
            },
        })
    }

    pub fn from_xml(content: &str) -> Result<Self> {
        let image: XmlImage = quick_xml::de::from_str(content)?;

        let mut packages = Vec::new();
        for package in image.packages.map(|p| p.entries).unwrap_or_default() {
            let version = match &package.version {
                Some(text) => text.parse()?,
                None => crate::version::VersionSpecifier::AnyRelease,
            };
            let mut spec = PackageSpecifier::new(package.name, version);
            if let Some(os) = package.os {
                spec = spec.with_os(os);
            }
            if let Some(arch) = package.architecture {
                spec = spec.with_architecture(arch.parse()?);
            }
            packages.push(spec);
        }

        let architecture = match image.architecture {
            Some(text) => Some(text.parse()?),
            None => None,
        };

        Ok(ImageDocument {
            packages,
            repositories: image
                .repositories
                .map(|r| r.entries.into_iter().map(|e| e.url).collect())
                .unwrap_or_default(),
            os: image.os,
            architecture,
        })
    }

    /// Comma-separated `name[:version]` list.
    pub fn from_inline(content: &str) -> Result<Self> {
        let packages = content
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(PackageSpecifier::parse_inline)
            .collect::<Result<Vec<_>>>()?;

        if packages.is_empty() {
            return Err(Error::InvalidImage("empty image document".to_string()));
        }

        Ok(ImageDocument {
            packages,
            ..Default::default()
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Image(JsonImage),
    Packages(Vec<PackageSpecifier>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonImage {
    #[serde(default)]
    packages: Vec<PackageSpecifier>,

    #[serde(default)]
    repositories: Vec<String>,

    #[serde(default)]
    os: Option<String>,

    #[serde(default)]
    architecture: Option<CpuArchitecture>,
}

#[derive(Debug, Deserialize)]
struct XmlImage {
    #[serde(rename = "@OS")]
    os: Option<String>,

    #[serde(rename = "@Architecture")]
    architecture: Option<String>,

    #[serde(rename = "Repositories")]
    repositories: Option<XmlRepositories>,

    #[serde(rename = "Packages")]
    packages: Option<XmlPackages>,
}

#[derive(Debug, Deserialize)]
struct XmlRepositories {
    #[serde(rename = "Repository", default)]
    entries: Vec<XmlRepository>,
}

#[derive(Debug, Deserialize)]
struct XmlRepository {
    #[serde(rename = "@url")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct XmlPackages {
    #[serde(rename = "Package", default)]
    entries: Vec<XmlPackage>,
}

#[derive(Debug, Deserialize)]
struct XmlPackage {
    #[serde(rename = "@name")]
    name: String,

    #[serde(rename = "@version")]
    version: Option<String>,

    #[serde(rename = "@os")]
    os: Option<String>,

    #[serde(rename = "@architecture")]
    architecture: Option<String>,
}

/// Load a side-loaded package definition from disk (JSON, or XML when the
/// file starts with `<`). The merge engine pins these as exact versions.
pub fn load_package_def(path: &Path) -> Result<PackageDef> {
    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim_start();

    if trimmed.starts_with('<') {
        let package: XmlPackageDef = quick_xml::de::from_str(&content)?;
        let mut def = PackageDef {
            name: package.name,
            version: crate::version::parse_version(&package.version)?,
            os: package.os.unwrap_or_default(),
            architecture: match package.architecture {
                Some(text) => text.parse()?,
                None => CpuArchitecture::Unspecified,
            },
            dependencies: Vec::new(),
            source_repository: None,
        };
        for dep in package.dependencies.map(|d| d.entries).unwrap_or_default() {
            def.dependencies
                .push(PackageDependency::new(dep.name, dep.version.parse()?));
        }
        Ok(def)
    } else {
        let mut def: PackageDef = serde_json::from_str(&content)?;
        def.source_repository = None;
        Ok(def)
    }
}

#[derive(Debug, Deserialize)]
struct XmlPackageDef {
    #[serde(rename = "@name")]
    name: String,

    #[serde(rename = "@version")]
    version: String,

    #[serde(rename = "@os")]
    os: Option<String>,

    #[serde(rename = "@architecture")]
    architecture: Option<String>,

    #[serde(rename = "Dependencies")]
    dependencies: Option<XmlDependencies>,
}

#[derive(Debug, Deserialize)]
struct XmlDependencies {
    #[serde(rename = "PackageDependency", default)]
    entries: Vec<XmlDependency>,
}

#[derive(Debug, Deserialize)]
struct XmlDependency {
    #[serde(rename = "@name")]
    name: String,

    #[serde(rename = "@version", default)]
    version: String,
}
