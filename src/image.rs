//! Image specifiers and image identifiers
//!
//! An [`ImageSpecifier`] is the declarative input to a resolve: root package
//! specifiers, target OS and architecture, and the repositories to draw
//! candidates from. An [`ImageIdentifier`] is the immutable output: the
//! concrete package set a deploy subsystem can materialize.

use crate::package::{CpuArchitecture, PackageDef, PackageSpecifier};
use crate::{Error, Result};
use semver::Version;
use std::collections::BTreeMap;

/// Declarative description of a desired installation.
///
/// `fixed_packages` and `installed_packages` are empty outside merge flows;
/// the merge engine populates them from the current installation.
#[derive(Debug, Clone, Default)]
pub struct ImageSpecifier {
    /// Root package specifiers the resolution must satisfy.
    pub packages: Vec<PackageSpecifier>,

    /// Repository locations in winning order.
    pub repositories: Vec<String>,

    /// Target operating system name (matched case-insensitively).
    pub os: String,

    /// Target CPU architecture.
    pub architecture: CpuArchitecture,

    /// Strict constraints carried over from an existing installation.
    pub fixed_packages: Vec<PackageSpecifier>,

    /// Definitions seeded into the dependency cache without a repository.
    pub installed_packages: Vec<PackageDef>,
}

impl ImageSpecifier {
    pub fn builder() -> ImageSpecifierBuilder {
        ImageSpecifierBuilder::default()
    }
}

/// Builds an [`ImageSpecifier`], rejecting duplicate root names and a
/// missing target at build time.
#[derive(Debug, Default)]
pub struct ImageSpecifierBuilder {
    packages: Vec<PackageSpecifier>,
    repositories: Vec<String>,
    os: Option<String>,
    architecture: Option<CpuArchitecture>,
    fixed_packages: Vec<PackageSpecifier>,
    installed_packages: Vec<PackageDef>,
}

impl ImageSpecifierBuilder {
    pub fn package(mut self, spec: PackageSpecifier) -> Self {
        self.packages.push(spec);
        self
    }

    pub fn packages(mut self, specs: impl IntoIterator<Item = PackageSpecifier>) -> Self {
        self.packages.extend(specs);
        self
    }

    pub fn repository(mut self, location: impl Into<String>) -> Self {
        self.repositories.push(location.into());
        self
    }

    pub fn repositories(mut self, locations: impl IntoIterator<Item = String>) -> Self {
        self.repositories.extend(locations);
        self
    }

    pub fn os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn architecture(mut self, arch: CpuArchitecture) -> Self {
        self.architecture = Some(arch);
        self
    }

    pub fn fixed_package(mut self, spec: PackageSpecifier) -> Self {
        self.fixed_packages.push(spec);
        self
    }

    pub fn installed_package(mut self, def: PackageDef) -> Self {
        self.installed_packages.push(def);
        self
    }

    pub fn build(self) -> Result<ImageSpecifier> {
        let os = self
            .os
            .filter(|os| !os.trim().is_empty())
            .ok_or_else(|| Error::InvalidImage("target OS is not set".to_string()))?;
        let architecture = self
            .architecture
            .ok_or_else(|| Error::InvalidImage("target architecture is not set".to_string()))?;

        let mut seen = std::collections::BTreeSet::new();
        for spec in &self.packages {
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::InvalidImage(format!(
                    "duplicate root package '{}'",
                    spec.name
                )));
            }
        }

        Ok(ImageSpecifier {
            packages: self.packages,
            repositories: self.repositories,
            os,
            architecture,
            fixed_packages: self.fixed_packages,
            installed_packages: self.installed_packages,
        })
    }
}

/// Immutable result of a successful resolve: every selected package with its
/// dependencies satisfied inside the set.
///
/// Deployment is a separate subsystem: it is expected to fetch each
/// package's payload from [`source_repository`](ImageIdentifier::source_repository)
/// and install the set in [`packages`](ImageIdentifier::packages) order. The
/// identifier itself performs no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageIdentifier {
    /// Sorted by name for stable identity comparisons.
    packages: Vec<PackageDef>,
    /// Package names, dependencies before dependents.
    deploy_order: Vec<String>,
    repositories: Vec<String>,
}

impl ImageIdentifier {
    pub(crate) fn new(
        mut packages: Vec<PackageDef>,
        deploy_order: Vec<String>,
        repositories: Vec<String>,
    ) -> Self {
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            packages,
            deploy_order,
            repositories,
        }
    }

    /// The resolved set in deploy order (dependencies first).
    pub fn packages(&self) -> Vec<&PackageDef> {
        self.deploy_order
            .iter()
            .filter_map(|name| self.find(name))
            .collect()
    }

    /// The resolved set sorted by package name.
    pub fn packages_by_name(&self) -> &[PackageDef] {
        &self.packages
    }

    pub fn find(&self, name: &str) -> Option<&PackageDef> {
        self.packages
            .binary_search_by(|def| def.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.packages[i])
    }

    pub fn version_of(&self, name: &str) -> Option<&Version> {
        self.find(name).map(|def| &def.version)
    }

    /// Which repository a package was drawn from; `None` for side-loaded
    /// definitions.
    pub fn source_repository(&self, name: &str) -> Option<&str> {
        self.find(name)?.source_repository.as_deref()
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    /// Name → version view of the assignment.
    pub fn assignments(&self) -> BTreeMap<&str, &Version> {
        self.packages
            .iter()
            .map(|def| (def.name.as_str(), &def.version))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }
}
