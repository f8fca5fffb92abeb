//! End-to-end resolver scenarios against the deterministic package fixture.
//!
//! These tests drive the full pipeline: file-backed repositories populate a
//! dependency cache, and the backtracking search resolves image specifiers
//! against it. They cover straight upgrades, transitive dependencies, exact
//! pins, cycles, target filtering, merge flows, and failure reporting.


use rigpm::{
    CancellationToken, CpuArchitecture, DependencyGraph, Error, ImageIdentifier, ImageSpecifier,
    PackageSpecifier, Repository, VersionSpecifier,
};
use semver::Version;
use test_utils::{standard_fixture, native_variants_fixture, MockPackage, TestRepository};

fn build_spec(
    repos: &[&TestRepository],
    target_os: &str,
    target_arch: CpuArchitecture,
    roots: &[(&str, &str)],
) -> ImageSpecifier {
    let mut builder = ImageSpecifier::builder().os(target_os).architecture(target_arch);
    for repo in repos {
        builder = builder.repository(repo.location());
    }
    for (name, version) in roots {
        builder = builder.package(PackageSpecifier::new(
            *name,
            version.parse::<VersionSpecifier>().unwrap(),
        ));
    }
    builder.build().unwrap()
}

fn resolve_spec(repos: &[&TestRepository], spec: &ImageSpecifier) -> rigpm::Result<ImageIdentifier> {
    let cancel = CancellationToken::new();
    let clients: Vec<Repository> = repos.iter().map(|r| r.client()).collect();
    let graph = DependencyGraph::populate(spec, &clients, &cancel)?;
    rigpm::resolve_image(spec, &graph, &cancel)
}

fn resolve(
    repos: &[&TestRepository],
    target_os: &str,
    target_arch: CpuArchitecture,
    roots: &[(&str, &str)],
) -> rigpm::Result<ImageIdentifier> {
    let spec = build_spec(repos, target_os, target_arch, roots);
    resolve_spec(repos, &spec)
}

fn version_of(image: &ImageIdentifier, name: &str) -> Version {
    image
        .version_of(name)
        .unwrap_or_else(|| panic!("{} missing from image", name))
        .clone()
}

/// Every dependency of every package must be satisfied inside the set.
fn assert_closed(image: &ImageIdentifier) {
    for package in image.packages_by_name() {
        for dep in &package.dependencies {
            let assigned = image
                .version_of(&dep.name)
                .unwrap_or_else(|| panic!("{} depends on missing {}", package, dep.name));
            assert!(
                dep.version.is_satisfied_by(assigned),
                "{} requires {} '{}' but got {}",
                package,
                dep.name,
                dep.version,
                assigned
            );
        }
    }
}

// ============================================================================
// Scenario tests
// ============================================================================

#[test]
fn test_single_root_picks_highest_matching() {
    let repo = standard_fixture();
    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("OpenTAP", "^9.12.0")],
    )
    .unwrap();

    assert_eq!(image.len(), 1);
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));
}

#[test]
fn test_transitive_dependency_resolved_together() {
    let repo = standard_fixture();
    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("Demonstration", "^9.0.0")],
    )
    .unwrap();

    assert_eq!(version_of(&image, "Demonstration"), Version::new(9, 1, 0));
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));
    assert_closed(&image);
}

#[test]
fn test_two_level_dependency_chain() {
    let repo = standard_fixture();
    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("MyDemoTestPlan", "^1.0.0")],
    )
    .unwrap();

    assert_eq!(version_of(&image, "MyDemoTestPlan"), Version::new(1, 1, 0));
    assert_eq!(version_of(&image, "Demonstration"), Version::new(9, 1, 0));
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));
    assert_closed(&image);

    // Deploy order puts leaves first.
    let deploy: Vec<&str> = image.packages().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(deploy, vec!["OpenTAP", "Demonstration", "MyDemoTestPlan"]);
}

#[test]
fn test_exact_dependency_pins_transitively() {
    let repo = standard_fixture();
    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("ExactDependency", "1.0.0")],
    )
    .unwrap();

    assert_eq!(version_of(&image, "ExactDependency"), Version::new(1, 0, 0));
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 13, 1));
}

#[test]
fn test_mutual_cycle_resolves() {
    let repo = standard_fixture();
    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("Cyclic", "1.0.0"), ("Cyclic2", "1.0.0")],
    )
    .unwrap();

    assert_eq!(version_of(&image, "Cyclic"), Version::new(1, 0, 0));
    assert_eq!(version_of(&image, "Cyclic2"), Version::new(1, 0, 0));
    assert_closed(&image);
}

#[test]
fn test_native_variant_selected_for_target() {
    let fixture = standard_fixture();
    let variants = native_variants_fixture();
    let image = resolve(
        &[&fixture, &variants],
        "linux",
        CpuArchitecture::X86,
        &[("Native", "*")],
    )
    .unwrap();

    assert_eq!(image.len(), 1);
    let native = image.find("Native").unwrap();
    assert_eq!(native.version, Version::new(1, 0, 0));
    assert_eq!(native.os, "linux");
    assert_eq!(native.architecture, CpuArchitecture::X86);
}

// ============================================================================
// Boundary cases and quantified properties
// ============================================================================

#[test]
fn test_empty_root_list_resolves_to_empty_image() {
    let repo = standard_fixture();
    let image = resolve(&[&repo], "linux", CpuArchitecture::X64, &[]).unwrap();
    assert!(image.is_empty());
}

#[test]
fn test_any_specifier_selects_highest_release() {
    let repo = standard_fixture();
    let image = resolve(&[&repo], "linux", CpuArchitecture::X64, &[("OpenTAP", "")]).unwrap();
    // 9.13.2-beta.1 is skipped: highest release wins.
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));

    let image = resolve(&[&repo], "linux", CpuArchitecture::X64, &[("OpenTAP", "*")]).unwrap();
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));
}

#[test]
fn test_prerelease_selected_only_when_demanded() {
    let repo = standard_fixture();

    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("OpenTAP", "9.13.2-beta.1")],
    )
    .unwrap();
    assert_eq!(
        version_of(&image, "OpenTAP"),
        "9.13.2-beta.1".parse::<Version>().unwrap()
    );

    // A pre-release reference opens the range from that pre-release up.
    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("OpenTAP", "^9.13.2-beta.1")],
    )
    .unwrap();
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));
}

#[test]
fn test_bare_root_is_not_overridden_by_prerelease_dependency() {
    // A bare root admits releases only. Folding a dependency's pre-release
    // reference over it must not let the pre-release win when it is the only
    // in-range candidate.
    let mut repo = TestRepository::new();
    repo.add_package(MockPackage::new("OpenTAP", "9.13.1"));
    repo.add_package(MockPackage::new("OpenTAP", "9.13.2-beta.1"));
    repo.add_package(
        MockPackage::new("Plugin", "1.0.0").with_dependency("OpenTAP", "^9.13.2-beta.1"),
    );

    let err = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("Plugin", "^1.0.0"), ("OpenTAP", "")],
    )
    .unwrap_err();
    assert!(matches!(err, Error::Unsatisfiable { .. }));

    // With a release above the pre-release reference available, the same
    // roots resolve to it.
    repo.add_package(MockPackage::new("OpenTAP", "9.13.2"));
    let image = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("Plugin", "^1.0.0"), ("OpenTAP", "")],
    )
    .unwrap();
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 13, 2));
}

#[test]
fn test_idempotent_resolution() {
    let repo = standard_fixture();
    let spec = build_spec(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("MyDemoTestPlan", "^1.0.0")],
    );

    let first = resolve_spec(&[&repo], &spec).unwrap();
    let second = resolve_spec(&[&repo], &spec).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_added_repository_does_not_change_resolution() {
    let repo = standard_fixture();

    // The second repository re-publishes OpenTAP 9.14.0 with different
    // metadata; first-wins de-duplication must ignore it.
    let mut shadow = TestRepository::new();
    shadow.add_package(
        MockPackage::new("OpenTAP", "9.14.0").with_dependency("Sneaky", "^1.0.0"),
    );

    let baseline = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("OpenTAP", "^9.12.0")],
    )
    .unwrap();
    let with_shadow = resolve(
        &[&repo, &shadow],
        "linux",
        CpuArchitecture::X64,
        &[("OpenTAP", "^9.12.0")],
    )
    .unwrap();

    assert_eq!(baseline.packages_by_name(), with_shadow.packages_by_name());
    assert_eq!(baseline.assignments(), with_shadow.assignments());
    assert!(with_shadow.find("Sneaky").is_none());
}

#[test]
fn test_asymmetric_cycle_finds_fixpoint() {
    let mut repo = TestRepository::new();
    repo.add_package(MockPackage::new("CycleX", "1.0.0").with_dependency("CycleY", "1.0.0"));
    repo.add_package(MockPackage::new("CycleX", "2.0.0").with_dependency("CycleY", "^1.0.0"));
    repo.add_package(MockPackage::new("CycleY", "1.0.0").with_dependency("CycleX", "2.0.0"));

    let image = resolve(&[&repo], "linux", CpuArchitecture::X64, &[("CycleX", "*")]).unwrap();

    // CycleX@1.0.0 would demand CycleX@2.0.0 through the cycle; only the
    // {CycleX=2.0.0, CycleY=1.0.0} assignment is coherent.
    assert_eq!(version_of(&image, "CycleX"), Version::new(2, 0, 0));
    assert_eq!(version_of(&image, "CycleY"), Version::new(1, 0, 0));
    assert_closed(&image);
}

// ============================================================================
// Failure reporting
// ============================================================================

#[test]
fn test_conflicting_roots_fail_with_diagnostics() {
    let mut repo = TestRepository::new();
    repo.add_package(MockPackage::new("Shared", "1.0.0"));
    repo.add_package(MockPackage::new("Shared", "2.0.0"));
    repo.add_package(MockPackage::new("Left", "1.0.0").with_dependency("Shared", "^1.0.0"));
    repo.add_package(MockPackage::new("Right", "1.0.0").with_dependency("Shared", "^2.0.0"));

    let err = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("Left", "^1.0.0"), ("Right", "^1.0.0")],
    )
    .unwrap_err();

    match err {
        Error::Unsatisfiable { conflicts, graph } => {
            assert!(!conflicts.is_empty());
            assert!(conflicts.iter().any(|c| c.contains("Shared")));
            assert!(graph.contains("digraph image"));
            assert!(graph.contains("Shared"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_unknown_package_suggests_similar_names() {
    let repo = standard_fixture();
    let err = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("Demonstration", "^9.0.0"), ("Demonstratio", "^9.0.0")],
    )
    .unwrap_err();

    match err {
        Error::PackageNotFound(message) => {
            assert!(message.contains("Demonstratio"));
            assert!(message.contains("Demonstration"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_no_compatible_variant_error() {
    let mut repo = TestRepository::new();
    repo.add_package(
        MockPackage::new("WinTool", "1.0.0")
            .with_os("windows")
            .with_architecture(CpuArchitecture::X64),
    );

    let err = resolve(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("WinTool", "^1.0.0")],
    )
    .unwrap_err();

    match err {
        Error::NoCompatibleVariant { name, os, arch } => {
            assert_eq!(name, "WinTool");
            assert_eq!(os, "linux");
            assert_eq!(arch, "x64");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_cancellation_is_distinguished() {
    let repo = standard_fixture();
    let spec = build_spec(
        &[&repo],
        "linux",
        CpuArchitecture::X64,
        &[("OpenTAP", "^9.12.0")],
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let clients = vec![repo.client()];
    let err = DependencyGraph::populate(&spec, &clients, &cancel).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

// ============================================================================
// Merge flows
// ============================================================================

fn installed_def(name: &str, version: &str, deps: &[(&str, &str)]) -> rigpm::PackageDef {
    rigpm::PackageDef {
        name: name.to_string(),
        version: version.parse().unwrap(),
        os: "windows,linux".to_string(),
        architecture: CpuArchitecture::AnyCpu,
        dependencies: deps
            .iter()
            .map(|(n, v)| rigpm::PackageDependency::new(*n, v.parse().unwrap()))
            .collect(),
        source_repository: None,
    }
}

#[test]
fn test_merge_retains_and_upgrades_within_major() {
    let repo = standard_fixture();

    let spec = rigpm::merge(
        vec![PackageSpecifier::new(
            "Demonstration",
            "^9.0.0".parse().unwrap(),
        )],
        vec![installed_def("OpenTAP", "9.13.1", &[])],
        vec![repo.location()],
        "linux",
        CpuArchitecture::X64,
    )
    .unwrap();

    let image = resolve_spec(&[&repo], &spec).unwrap();

    // Demonstration forces an OpenTAP at ^9.12.0; the retained install is
    // soft-fixed at ^9.13.1, so the minor upgrade to 9.14.0 goes through.
    assert_eq!(version_of(&image, "Demonstration"), Version::new(9, 1, 0));
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));
    assert_closed(&image);
}

#[test]
fn test_merge_keeps_unrelated_packages_unchanged() {
    let repo = standard_fixture();

    let spec = rigpm::merge(
        vec![PackageSpecifier::new("OpenTAP", "^9.12.0".parse().unwrap())],
        vec![installed_def("Keepsake", "2.3.0", &[])],
        vec![repo.location()],
        "linux",
        CpuArchitecture::X64,
    )
    .unwrap();

    // Keepsake exists only as an installed seed; no repository serves it.
    let image = resolve_spec(&[&repo], &spec).unwrap();
    assert_eq!(version_of(&image, "Keepsake"), Version::new(2, 3, 0));
    assert_eq!(version_of(&image, "OpenTAP"), Version::new(9, 14, 0));
}

#[test]
fn test_merge_conflict_across_major_version() {
    let mut repo = TestRepository::new();
    repo.add_package(MockPackage::new("Runtime", "1.0.0"));
    repo.add_package(MockPackage::new("Runtime", "2.0.0"));
    repo.add_package(MockPackage::new("NewApp", "1.0.0").with_dependency("Runtime", "^2.0.0"));

    let spec = rigpm::merge(
        vec![PackageSpecifier::new("NewApp", "^1.0.0".parse().unwrap())],
        vec![installed_def("Runtime", "1.0.0", &[])],
        vec![repo.location()],
        "linux",
        CpuArchitecture::X64,
    )
    .unwrap();

    // The retained Runtime is fixed to ^1.0.0; NewApp demands ^2.0.0.
    let err = resolve_spec(&[&repo], &spec).unwrap_err();
    assert!(matches!(err, Error::Unsatisfiable { .. }));
}
