//! Image resolution
//!
//! Turns an [`ImageSpecifier`] plus a populated [`DependencyGraph`] into a
//! concrete name→version assignment. The search is a backtracking walk over
//! aggregate constraints: every specifier seen for a name is folded into a
//! single most-restrictive constraint, the open name with the fewest
//! feasible candidates is expanded first, and candidates are tried highest
//! version first. Dead ends are recorded as [`ConflictReport`]s and drawn
//! into a Dot diagnostic graph.
//!
//! Given identical inputs the search is fully deterministic: candidate
//! lists are version-descending, ties break alphabetically, and the output
//! deploy order is a topological sort with alphabetic tie-breaking.
//!
//! # Examples
//!
//! ```no_run
//! use rigpm::{
//!     CancellationToken, CpuArchitecture, DependencyGraph, ImageSpecifier, PackageSpecifier,
//!     Repository,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = ImageSpecifier::builder()
//!     .os("linux")
//!     .architecture(CpuArchitecture::X64)
//!     .repository("https://packages.example.com")
//!     .package(PackageSpecifier::new("OpenTAP", "^9.12.0".parse()?))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let repositories: Vec<Repository> = spec
//!     .repositories
//!     .iter()
//!     .map(|loc| Repository::connect(loc))
//!     .collect::<Result<_, _>>()?;
//! let graph = DependencyGraph::populate(&spec, &repositories, &cancel)?;
//! let image = rigpm::resolve_image(&spec, &graph, &cancel)?;
//! for package in image.packages() {
//!     println!("{}", package);
//! }
//! # Ok(())
//! # }
//! ```

use crate::cache::DependencyGraph;
use crate::cancel::CancellationToken;
use crate::diagnostic::{ConflictReport, DotGraph};
use crate::image::{ImageIdentifier, ImageSpecifier};
use crate::package::{os_matches, CpuArchitecture, PackageDef, PackageSpecifier};
use crate::version::VersionSpecifier;
use crate::{Error, Result};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};

/// Optional hook consulted before the cache when the resolver needs
/// candidates for a name. Returning a definition short-circuits the cache
/// for that name.
pub type ResolveHook<'a> = dyn Fn(&PackageSpecifier) -> Option<PackageDef> + 'a;

/// Outcome of a resolution attempt. `success` decides whether
/// [`into_identifier`](ImageResolution::into_identifier) yields an image or
/// the aggregate failure.
#[derive(Debug)]
pub struct ImageResolution {
    pub assignments: BTreeMap<String, Version>,
    pub success: bool,
    pub conflicts: Vec<ConflictReport>,
    pub diagnostic: DotGraph,
    selected: Vec<PackageDef>,
    deploy_order: Vec<String>,
    repositories: Vec<String>,
}

impl ImageResolution {
    /// The immutable image on success; [`Error::Unsatisfiable`] carrying the
    /// conflict messages and the Dot graph otherwise.
    pub fn into_identifier(self) -> Result<ImageIdentifier> {
        if self.success {
            Ok(ImageIdentifier::new(
                self.selected,
                self.deploy_order,
                self.repositories,
            ))
        } else {
            Err(Error::Unsatisfiable {
                conflicts: self.conflicts.iter().map(|c| c.to_string()).collect(),
                graph: self.diagnostic.render(),
            })
        }
    }
}

/// Resolve an image and return its identifier, or the first error.
pub fn resolve_image(
    spec: &ImageSpecifier,
    graph: &DependencyGraph,
    cancel: &CancellationToken,
) -> Result<ImageIdentifier> {
    Resolver::new(graph).resolve(spec, cancel)?.into_identifier()
}

/// Where a constraint on a name came from, for conflict attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConstraintOrigin {
    Root,
    Fixed,
    Dependency { parent: String },
}

impl ConstraintOrigin {
    fn describe(&self) -> String {
        match self {
            ConstraintOrigin::Root => "the image".to_string(),
            ConstraintOrigin::Fixed => "the installation".to_string(),
            ConstraintOrigin::Dependency { parent } => parent.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct ConstraintSource {
    origin: ConstraintOrigin,
    spec: VersionSpecifier,
}

/// All specifiers seen for one name, folded into their intersection.
#[derive(Debug, Clone)]
struct AggregateConstraint {
    spec: VersionSpecifier,
    architecture: CpuArchitecture,
    os: Option<String>,
    sources: Vec<ConstraintSource>,
}

impl AggregateConstraint {
    fn unconstrained() -> Self {
        Self {
            spec: VersionSpecifier::Any,
            architecture: CpuArchitecture::Unspecified,
            os: None,
            sources: Vec::new(),
        }
    }

    /// Fold another specifier in. Returns false when the intersection is
    /// empty; the aggregate is left unchanged in that case.
    fn fold(&mut self, spec: &VersionSpecifier, origin: ConstraintOrigin) -> bool {
        match self.spec.intersect(spec) {
            Some(intersection) => {
                self.spec = intersection;
                self.sources.push(ConstraintSource {
                    origin,
                    spec: spec.clone(),
                });
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
struct SearchState {
    constraints: BTreeMap<String, AggregateConstraint>,
    assignments: BTreeMap<String, Version>,
    selected: BTreeMap<String, PackageDef>,
    open: BTreeSet<String>,
}

impl SearchState {
    fn new() -> Self {
        Self {
            constraints: BTreeMap::new(),
            assignments: BTreeMap::new(),
            selected: BTreeMap::new(),
            open: BTreeSet::new(),
        }
    }
}

/// Why a candidate was rejected, for pruning reports.
enum Rejection {
    Constraint(ConstraintSource),
    Prerelease,
    Architecture(String),
}

impl Rejection {
    fn describe(&self) -> String {
        match self {
            Rejection::Constraint(source) => format!(
                "rejected by '{}' required by {}",
                source.spec,
                source.origin.describe()
            ),
            Rejection::Prerelease => "pre-release versions are not selected implicitly".to_string(),
            Rejection::Architecture(detail) => detail.clone(),
        }
    }
}

pub struct Resolver<'a> {
    graph: &'a DependencyGraph,
    hook: Option<&'a ResolveHook<'a>>,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph, hook: None }
    }

    pub fn with_hook(mut self, hook: &'a ResolveHook<'a>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Run the search. `Err` is reserved for cancellation and for failures
    /// known before the search starts (unknown roots, immediately empty
    /// intersections); dead-ended searches return a failed
    /// [`ImageResolution`] with diagnostics instead.
    pub fn resolve(
        &self,
        spec: &ImageSpecifier,
        cancel: &CancellationToken,
    ) -> Result<ImageResolution> {
        let mut state = SearchState::new();

        for root in &spec.packages {
            self.collect(&mut state, root, ConstraintOrigin::Root)?;
        }
        for fixed in &spec.fixed_packages {
            self.collect(&mut state, fixed, ConstraintOrigin::Fixed)?;
        }

        // Roots must be resolvable at all before the search bothers.
        for name in state.open.clone() {
            if self.candidates_for(&name, &state).is_empty() {
                return Err(self.missing_package_error(&name));
            }
        }

        let mut diagnostic = DotGraph::new();
        let mut conflicts = Vec::new();

        match self.search(state, cancel, &mut diagnostic, &mut conflicts)? {
            Some(final_state) => {
                let selected: Vec<PackageDef> = final_state.selected.into_values().collect();
                let deploy_order = deploy_order(&selected);
                Ok(ImageResolution {
                    assignments: final_state.assignments,
                    success: true,
                    conflicts: Vec::new(),
                    diagnostic,
                    selected,
                    deploy_order,
                    repositories: spec.repositories.clone(),
                })
            }
            None => Ok(ImageResolution {
                assignments: BTreeMap::new(),
                success: false,
                conflicts,
                diagnostic,
                selected: Vec::new(),
                deploy_order: Vec::new(),
                repositories: spec.repositories.clone(),
            }),
        }
    }

    fn collect(
        &self,
        state: &mut SearchState,
        package: &PackageSpecifier,
        origin: ConstraintOrigin,
    ) -> Result<()> {
        let entry = state
            .constraints
            .entry(package.name.clone())
            .or_insert_with(AggregateConstraint::unconstrained);

        let previous = entry.spec.clone();
        if !entry.fold(&package.version, origin) {
            return Err(Error::ConstraintIntersectionEmpty {
                name: package.name.clone(),
                left: previous.to_string(),
                right: package.version.to_string(),
            });
        }

        if package.architecture != CpuArchitecture::Unspecified {
            entry.architecture = package.architecture;
        }
        if let Some(os) = &package.os {
            entry.os = Some(os.clone());
        }

        state.open.insert(package.name.clone());
        Ok(())
    }

    fn missing_package_error(&self, name: &str) -> Error {
        if self.graph.is_target_incompatible(name) {
            return Error::NoCompatibleVariant {
                name: name.to_string(),
                os: self.graph.target_os().to_string(),
                arch: self.graph.target_arch().to_string(),
            };
        }

        let mut message = format!("'{}' does not exist in any configured repository", name);
        let similar = self.graph.similar_names(name);
        if !similar.is_empty() {
            message.push_str("\n\nDid you mean one of these?\n  ");
            message.push_str(&similar.join("\n  "));
        }
        Error::PackageNotFound(message)
    }

    /// Candidates for a name in preference order: the hook first, then the
    /// cache.
    fn candidates_for(&self, name: &str, state: &SearchState) -> Vec<PackageDef> {
        if let Some(hook) = self.hook {
            let spec = state
                .constraints
                .get(name)
                .map(|c| c.spec.clone())
                .unwrap_or(VersionSpecifier::Any);
            if let Some(def) = hook(&PackageSpecifier::new(name, spec)) {
                return vec![def];
            }
        }
        self.graph.candidates(name).to_vec()
    }

    /// Check one candidate against every constraint recorded for its name,
    /// the pre-release rule and architecture coexistence with everything
    /// already selected.
    fn check_candidate(&self, def: &PackageDef, state: &SearchState) -> Option<Rejection> {
        let aggregate = state.constraints.get(&def.name);
        let unconstrained = VersionSpecifier::Any;
        let spec = aggregate.map(|c| &c.spec).unwrap_or(&unconstrained);

        // Every recorded source must accept the candidate on its own. The
        // folded aggregate is the most restrictive single specifier, not an
        // exact intersection: folding a pre-release reference over a
        // release-only constraint keeps the release-only source binding here
        // even though the fold lost it.
        if let Some(source) = aggregate.and_then(|c| {
            c.sources
                .iter()
                .find(|s| !s.spec.is_satisfied_by(&def.version))
        }) {
            return Some(Rejection::Constraint(source.clone()));
        }

        if !spec.is_satisfied_by(&def.version) {
            return Some(Rejection::Constraint(ConstraintSource {
                origin: ConstraintOrigin::Root,
                spec: spec.clone(),
            }));
        }

        if !def.version.pre.is_empty() && !spec.permits_prerelease() {
            return Some(Rejection::Prerelease);
        }

        if let Some(c) = aggregate {
            if !c.architecture.supports(def.architecture) {
                return Some(Rejection::Architecture(format!(
                    "architecture {} does not satisfy the requested {}",
                    def.architecture, c.architecture
                )));
            }
            if let Some(os) = &c.os {
                if !os_matches(&def.os, os) {
                    return Some(Rejection::Architecture(format!(
                        "OS '{}' does not cover the requested '{}'",
                        def.os, os
                    )));
                }
            }
        }

        for other in state.selected.values() {
            if !def.architecture.coexists_with(other.architecture) {
                return Some(Rejection::Architecture(format!(
                    "architecture {} cannot coexist with {} ({})",
                    def.architecture, other, other.architecture
                )));
            }
        }

        None
    }

    fn feasible_count(&self, name: &str, state: &SearchState) -> usize {
        self.candidates_for(name, state)
            .iter()
            .filter(|def| self.check_candidate(def, state).is_none())
            .count()
    }

    fn search(
        &self,
        state: SearchState,
        cancel: &CancellationToken,
        diagnostic: &mut DotGraph,
        conflicts: &mut Vec<ConflictReport>,
    ) -> Result<Option<SearchState>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Fail-first: expand the open name with the fewest feasible
        // candidates. BTreeSet iteration keeps ties alphabetic.
        let Some(name) = state
            .open
            .iter()
            .min_by_key(|name| self.feasible_count(name, &state))
            .cloned()
        else {
            return Ok(Some(state));
        };

        let candidates = self.candidates_for(&name, &state);
        let mut rejections: Vec<(Version, Rejection)> = Vec::new();

        for def in &candidates {
            let node = def.to_string();
            diagnostic.add_node(node.clone());

            if let Some(rejection) = self.check_candidate(def, &state) {
                diagnostic.reject_node(node);
                rejections.push((def.version.clone(), rejection));
                continue;
            }

            if let Some(next) = self.try_candidate(def, &state, cancel, diagnostic, conflicts)? {
                return Ok(Some(next));
            }
        }

        conflicts.push(pruning_report(&name, &state, candidates.len(), &rejections));
        Ok(None)
    }

    /// Tentatively assign one candidate, propagate its dependency edges into
    /// the aggregate constraints, and recurse.
    fn try_candidate(
        &self,
        def: &PackageDef,
        state: &SearchState,
        cancel: &CancellationToken,
        diagnostic: &mut DotGraph,
        conflicts: &mut Vec<ConflictReport>,
    ) -> Result<Option<SearchState>> {
        let node = def.to_string();
        let mut next = state.clone();
        next.open.remove(&def.name);
        next.assignments
            .insert(def.name.clone(), def.version.clone());
        next.selected.insert(def.name.clone(), def.clone());

        for dep in &def.dependencies {
            // A dependency back onto an assigned name closes a cycle; it is
            // checked against the existing assignment, never re-expanded.
            if let Some(assigned) = next.assignments.get(&dep.name) {
                let satisfied = dep.version.is_satisfied_by(assigned);
                diagnostic.add_edge(
                    node.clone(),
                    format!("{}@{}", dep.name, assigned),
                    dep.version.to_string(),
                    !satisfied,
                );
                if !satisfied {
                    diagnostic.reject_node(node.clone());
                    conflicts.push(ConflictReport::new(
                        dep.name.clone(),
                        format!(
                            "{} requires {} '{}', but {}@{} is already selected",
                            node, dep.name, dep.version, dep.name, assigned
                        ),
                    ));
                    return Ok(None);
                }
                continue;
            }

            let entry = next
                .constraints
                .entry(dep.name.clone())
                .or_insert_with(AggregateConstraint::unconstrained);
            let previous = entry.spec.clone();
            let folded = entry.fold(
                &dep.version,
                ConstraintOrigin::Dependency {
                    parent: node.clone(),
                },
            );
            diagnostic.add_edge(
                node.clone(),
                dep.name.clone(),
                dep.version.to_string(),
                !folded,
            );
            if !folded {
                diagnostic.reject_node(node.clone());
                conflicts.push(ConflictReport::new(
                    dep.name.clone(),
                    format!(
                        "{} requires {} '{}', which cannot be reconciled with '{}'",
                        node, dep.name, dep.version, previous
                    ),
                ));
                return Ok(None);
            }

            next.open.insert(dep.name.clone());
        }

        self.search(next, cancel, diagnostic, conflicts)
    }
}

fn pruning_report(
    name: &str,
    state: &SearchState,
    candidate_count: usize,
    rejections: &[(Version, Rejection)],
) -> ConflictReport {
    let aggregate = state
        .constraints
        .get(name)
        .map(|c| c.spec.to_string())
        .unwrap_or_default();

    let mut message = if aggregate.is_empty() {
        format!("no installable version of '{}' found", name)
    } else {
        format!("no version of '{}' satisfies '{}'", name, aggregate)
    };

    for (version, rejection) in rejections {
        message.push_str(&format!("\n  {}: {}", version, rejection.describe()));
    }
    if candidate_count == 0 {
        message.push_str("\n  no candidates were available");
    } else if rejections.len() < candidate_count {
        message.push_str("\n  remaining candidates lead to dependency conflicts");
    }

    ConflictReport::new(name, message)
}

/// Deploy order for a selected set: dependencies before dependents,
/// alphabetic tie-breaking, cycles broken at the alphabetically smallest
/// member.
fn deploy_order(selected: &[PackageDef]) -> Vec<String> {
    let names: BTreeSet<&str> = selected.iter().map(|d| d.name.as_str()).collect();

    let mut in_degree: BTreeMap<&str, usize> = names.iter().map(|n| (*n, 0)).collect();
    let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for def in selected {
        for dep in &def.dependencies {
            if names.contains(dep.name.as_str()) && dep.name != def.name {
                let fresh = dependents
                    .entry(dep.name.as_str())
                    .or_default()
                    .insert(def.name.as_str());
                if fresh {
                    *in_degree.get_mut(def.name.as_str()).unwrap() += 1;
                }
            }
        }
    }

    let mut order = Vec::with_capacity(names.len());
    let mut remaining = in_degree;

    while !remaining.is_empty() {
        // BTreeMap iteration gives the alphabetically smallest first; a
        // cycle leaves no zero-degree entry, so fall back to the smallest
        // remaining member to cut it.
        let next = remaining
            .iter()
            .find(|(_, degree)| **degree == 0)
            .or_else(|| remaining.iter().next())
            .map(|(name, _)| *name)
            .unwrap();

        remaining.remove(next);
        order.push(next.to_string());

        if let Some(deps) = dependents.get(next) {
            for dependent in deps {
                if let Some(degree) = remaining.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                }
            }
        }
    }

    order
}
