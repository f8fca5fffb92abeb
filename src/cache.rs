//! Dependency cache
//!
//! Aggregates package candidates from every configured repository into a
//! single [`DependencyGraph`] before resolution starts. Population walks the
//! dependency closure breadth-first, querying independent repositories in
//! parallel per round; the search that follows is pure lookup with no I/O.

use crate::cancel::CancellationToken;
use crate::image::ImageSpecifier;
use crate::package::{CpuArchitecture, PackageDef};
use crate::repository::Repository;
use crate::{Error, Result};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::thread;

/// Candidate packages per name, version-descending, all guaranteed
/// compatible with the image's target OS and architecture (seeded defs
/// excepted; they are admitted unconditionally).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    target_os: String,
    target_arch: CpuArchitecture,
    packages: BTreeMap<String, Vec<PackageDef>>,
    /// Names that repositories do publish, but with no variant compatible
    /// with the target. Kept for error reporting.
    incompatible: BTreeSet<String>,
}

impl DependencyGraph {
    pub fn new(target_os: impl Into<String>, target_arch: CpuArchitecture) -> Self {
        Self {
            target_os: target_os.into(),
            target_arch,
            packages: BTreeMap::new(),
            incompatible: BTreeSet::new(),
        }
    }

    pub fn target_os(&self) -> &str {
        &self.target_os
    }

    pub fn target_arch(&self) -> CpuArchitecture {
        self.target_arch
    }

    /// Build the cache for an image specifier: seed the installed defs, then
    /// fetch the dependency closure of all root and fixed names from the
    /// given repositories (first repository wins on duplicates).
    pub fn populate(
        spec: &ImageSpecifier,
        repositories: &[Repository],
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let mut graph = Self::new(spec.os.clone(), spec.architecture);

        for def in &spec.installed_packages {
            graph.add_seed(def.clone());
        }

        let mut pending: BTreeSet<String> = spec
            .packages
            .iter()
            .chain(spec.fixed_packages.iter())
            .map(|p| p.name.clone())
            .collect();
        for def in &spec.installed_packages {
            pending.insert(def.name.clone());
            for dep in &def.dependencies {
                pending.insert(dep.name.clone());
            }
        }

        let mut visited: BTreeSet<String> = BTreeSet::new();

        while !pending.is_empty() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let round: Vec<String> = pending
                .iter()
                .filter(|name| !visited.contains(*name))
                .cloned()
                .collect();
            pending.clear();
            if round.is_empty() {
                break;
            }
            visited.extend(round.iter().cloned());

            for (_, defs) in graph.fetch_round(&round, repositories)? {
                for def in defs {
                    for dep in &def.dependencies {
                        if !visited.contains(&dep.name) {
                            pending.insert(dep.name.clone());
                        }
                    }
                    graph.add_candidate(def);
                }
            }
        }

        graph.sort_candidates();
        Ok(graph)
    }

    /// Query one round of names from every repository, repositories in
    /// parallel, and flatten to (name, defs) in deterministic order. Defs
    /// incompatible with the target are dropped here, remembering the name.
    fn fetch_round(
        &mut self,
        names: &[String],
        repositories: &[Repository],
    ) -> Result<Vec<(String, Vec<PackageDef>)>> {
        type RepoResult = Result<Vec<(String, Vec<PackageDef>)>>;

        let per_repo: Vec<RepoResult> = thread::scope(|scope| {
            let handles: Vec<_> = repositories
                .iter()
                .map(|repo| {
                    scope.spawn(move || -> RepoResult {
                        let mut out = Vec::with_capacity(names.len());
                        for name in names {
                            let entries = repo.list_all_versions(name)?;
                            let defs = entries
                                .iter()
                                .map(|entry| repo.get_definition(entry))
                                .collect::<Result<Vec<_>>>()?;
                            out.push((name.clone(), defs));
                        }
                        Ok(out)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::Other("repository query panicked".into())))
                })
                .collect()
        });

        // Merge in repository order so the first repository wins
        // de-duplication downstream.
        let mut merged: BTreeMap<String, Vec<PackageDef>> = BTreeMap::new();
        for repo_result in per_repo {
            for (name, defs) in repo_result? {
                let slot = merged.entry(name.clone()).or_default();
                for def in defs {
                    if def.is_compatible_with(&self.target_os, self.target_arch) {
                        slot.push(def);
                    } else {
                        self.incompatible.insert(name.clone());
                    }
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Admit a definition unconditionally (installed or side-loaded
    /// packages; they may predate the current target filters).
    pub fn add_seed(&mut self, def: PackageDef) {
        self.insert_unique(def);
    }

    /// Admit a repository candidate; the first def per (name, version) wins.
    pub fn add_candidate(&mut self, def: PackageDef) {
        self.insert_unique(def);
    }

    fn insert_unique(&mut self, def: PackageDef) {
        let slot = self.packages.entry(def.name.clone()).or_default();
        if !slot.iter().any(|existing| existing.version == def.version) {
            slot.push(def);
        }
    }

    /// Order every candidate list version-descending. Population calls this
    /// once; call it again after seeding by hand.
    pub fn sort_candidates(&mut self) {
        for candidates in self.packages.values_mut() {
            candidates.sort_by(|a, b| b.version.cmp(&a.version));
        }
    }

    /// Candidates for a name, version-descending. Empty for unknown names.
    pub fn candidates(&self, name: &str) -> &[PackageDef] {
        self.packages.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, name: &str, version: &Version) -> Option<&PackageDef> {
        self.packages
            .get(name)?
            .iter()
            .find(|def| &def.version == version)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Did repositories publish this name only in target-incompatible
    /// variants?
    pub fn is_target_incompatible(&self, name: &str) -> bool {
        !self.packages.contains_key(name) && self.incompatible.contains(name)
    }

    /// Known names similar to `query`, for "did you mean" hints.
    pub fn similar_names(&self, query: &str) -> Vec<String> {
        let mut similar: Vec<String> = self
            .packages
            .keys()
            .chain(self.incompatible.iter())
            .filter(|name| {
                name.contains(query) || query.contains(name.as_str())
                    || levenshtein_distance(query, name) <= 3
            })
            .cloned()
            .collect();
        similar.sort();
        similar.dedup();
        similar.truncate(5);
        similar
    }
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let len1 = s1.chars().count();
    let len2 = s2.chars().count();
    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate().take(len1 + 1) {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate().take(len2 + 1) {
        *val = j;
    }

    for (i, c1) in s1.chars().enumerate() {
        for (j, c2) in s2.chars().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            matrix[i + 1][j + 1] = std::cmp::min(
                std::cmp::min(matrix[i][j + 1] + 1, matrix[i + 1][j] + 1),
                matrix[i][j] + cost,
            );
        }
    }

    matrix[len1][len2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{PackageDependency, PackageSpecifier};
    use crate::repository::{FileRepository, PackageIndex, PackageRecord};
    use crate::version::VersionSpecifier;
    use tempfile::TempDir;

    fn record(version: &str, os: &str, arch: CpuArchitecture) -> PackageRecord {
        PackageRecord {
            version: version.parse().unwrap(),
            os: os.to_string(),
            architecture: arch,
            dependencies: vec![],
        }
    }

    fn write_repo(dir: &TempDir, indexes: &[PackageIndex]) -> Repository {
        let repo = FileRepository::new(dir.path());
        for index in indexes {
            repo.write_index(index).unwrap();
        }
        Repository::File(repo)
    }

    fn image_spec(roots: &[&str]) -> ImageSpecifier {
        let mut builder = ImageSpecifier::builder()
            .os("linux")
            .architecture(CpuArchitecture::X64);
        for root in roots {
            builder = builder.package(PackageSpecifier::new(*root, VersionSpecifier::Any));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_populate_walks_dependency_closure() {
        let dir = TempDir::new().unwrap();
        let repo = write_repo(
            &dir,
            &[
                PackageIndex {
                    name: "App".to_string(),
                    description: None,
                    versions: vec![PackageRecord {
                        version: "1.0.0".parse().unwrap(),
                        os: "linux".to_string(),
                        architecture: CpuArchitecture::AnyCpu,
                        dependencies: vec![PackageDependency::new(
                            "Lib",
                            "^2.0.0".parse::<VersionSpecifier>().unwrap(),
                        )],
                    }],
                },
                PackageIndex {
                    name: "Lib".to_string(),
                    description: None,
                    versions: vec![record("2.1.0", "linux", CpuArchitecture::AnyCpu)],
                },
            ],
        );

        let graph = DependencyGraph::populate(
            &image_spec(&["App"]),
            &[repo],
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(graph.candidates("App").len(), 1);
        assert_eq!(graph.candidates("Lib").len(), 1);
    }

    #[test]
    fn test_first_repository_wins() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let repo_a = write_repo(
            &dir_a,
            &[PackageIndex {
                name: "App".to_string(),
                description: None,
                versions: vec![record("1.0.0", "linux", CpuArchitecture::AnyCpu)],
            }],
        );
        let repo_b = write_repo(
            &dir_b,
            &[PackageIndex {
                name: "App".to_string(),
                description: None,
                versions: vec![
                    record("1.0.0", "linux", CpuArchitecture::AnyCpu),
                    record("1.1.0", "linux", CpuArchitecture::AnyCpu),
                ],
            }],
        );

        let graph = DependencyGraph::populate(
            &image_spec(&["App"]),
            &[repo_a, repo_b],
            &CancellationToken::new(),
        )
        .unwrap();

        let candidates = graph.candidates("App");
        assert_eq!(candidates.len(), 2);
        // Version-descending, and 1.0.0 attributed to the first repository.
        assert_eq!(candidates[0].version, "1.1.0".parse().unwrap());
        let repo_of = |i: usize| candidates[i].source_repository.clone().unwrap();
        assert!(repo_of(1).contains(&dir_a.path().to_string_lossy().to_string()));
    }

    #[test]
    fn test_target_incompatible_tracking() {
        let dir = TempDir::new().unwrap();
        let repo = write_repo(
            &dir,
            &[PackageIndex {
                name: "WinOnly".to_string(),
                description: None,
                versions: vec![record("1.0.0", "windows", CpuArchitecture::X64)],
            }],
        );

        let graph = DependencyGraph::populate(
            &image_spec(&["WinOnly"]),
            &[repo],
            &CancellationToken::new(),
        )
        .unwrap();

        assert!(graph.candidates("WinOnly").is_empty());
        assert!(graph.is_target_incompatible("WinOnly"));
    }

    #[test]
    fn test_seeds_are_unconditional() {
        let mut spec = image_spec(&[]);
        spec.installed_packages.push(PackageDef {
            name: "SideLoaded".to_string(),
            version: "3.0.0".parse().unwrap(),
            os: "windows".to_string(),
            architecture: CpuArchitecture::X86,
            dependencies: vec![],
            source_repository: None,
        });

        let graph =
            DependencyGraph::populate(&spec, &[], &CancellationToken::new()).unwrap();
        assert_eq!(graph.candidates("SideLoaded").len(), 1);
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let err =
            DependencyGraph::populate(&image_spec(&["App"]), &[], &token).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_similar_names() {
        let mut graph = DependencyGraph::new("linux", CpuArchitecture::X64);
        graph.add_candidate(PackageDef {
            name: "Demonstration".to_string(),
            version: "9.0.2".parse().unwrap(),
            os: String::new(),
            architecture: CpuArchitecture::AnyCpu,
            dependencies: vec![],
            source_repository: None,
        });

        assert_eq!(graph.similar_names("Demonstratio"), vec!["Demonstration"]);
        assert!(graph.similar_names("zzz").is_empty());
    }
}
