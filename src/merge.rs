//! Merge engine
//!
//! Converts an existing installation plus a set of new root specifiers into
//! an augmented [`ImageSpecifier`] before resolution. Installed packages the
//! new roots do not replace are kept on a soft leash: they become
//! `Compatible(installed version)` fixed specifiers, so minor upgrades
//! forced by the new roots can go through while a major-version jump still
//! surfaces as a conflict. Their installed definitions are seeded into the
//! dependency cache so resolution works even for packages no repository
//! serves anymore.

use crate::document::load_package_def;
use crate::image::ImageSpecifier;
use crate::package::{CpuArchitecture, PackageDef, PackageSpecifier};
use crate::version::VersionSpecifier;
use crate::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Build the augmented specifier for a merge resolve.
///
/// Roots whose name is a package definition file on disk are loaded,
/// side-loaded into the cache seeds, and pinned to their exact version.
pub fn merge(
    new_packages: Vec<PackageSpecifier>,
    installed: Vec<PackageDef>,
    repositories: Vec<String>,
    os: impl Into<String>,
    architecture: CpuArchitecture,
) -> Result<ImageSpecifier> {
    let mut roots: Vec<PackageSpecifier> = Vec::with_capacity(new_packages.len());
    let mut side_loaded: Vec<PackageDef> = Vec::new();

    for spec in new_packages {
        let path = Path::new(&spec.name);
        if path.is_file() {
            let def = load_package_def(path)?;
            roots.push(PackageSpecifier::new(
                def.name.clone(),
                VersionSpecifier::as_exact(&def.version),
            ));
            side_loaded.push(def);
        } else {
            roots.push(spec);
        }
    }

    let replaced: BTreeSet<&str> = roots.iter().map(|spec| spec.name.as_str()).collect();

    let mut builder = ImageSpecifier::builder()
        .os(os)
        .architecture(architecture)
        .repositories(repositories)
        .packages(roots.iter().cloned());

    for def in side_loaded {
        builder = builder.installed_package(def);
    }

    for def in installed {
        if replaced.contains(def.name.as_str()) {
            continue;
        }
        builder = builder.fixed_package(PackageSpecifier::new(
            def.name.clone(),
            VersionSpecifier::as_compatible(&def.version),
        ));
        builder = builder.installed_package(def);
    }

    builder.build()
}
