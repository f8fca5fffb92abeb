//! Version algebra: semantic versions and version specifiers
//!
//! Concrete versions are [`semver::Version`] values (SemVer 2 ordering, with
//! pre-release precedence below the matching release). Specifiers are an
//! in-house sum type because the runtime's compatibility rules differ from
//! npm/Cargo ranges: a bare `X.Y.Z` pins an exact version, `^X.Y.Z` means
//! same-major upgrades, and `X.Y` means "at least this patch level of X.Y".
//!
//! # Examples
//!
//! ```
//! use rigpm::VersionSpecifier;
//!
//! let spec: VersionSpecifier = "^9.12.0".parse().unwrap();
//! assert!(spec.is_satisfied_by(&"9.14.0".parse().unwrap()));
//! assert!(!spec.is_satisfied_by(&"10.0.0".parse().unwrap()));
//! ```

use crate::{Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parse a concrete semantic version (`X.Y.Z[-pre][+build]`).
pub fn parse_version(input: &str) -> Result<Version> {
    Version::parse(input.trim()).map_err(|e| Error::Parse {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a version specifier string. See [`VersionSpecifier`] for the syntax.
pub fn parse_specifier(input: &str) -> Result<VersionSpecifier> {
    input.parse()
}

/// Total order over versions: major, minor, patch, then pre-release
/// precedence per SemVer 2 (a pre-release sorts below its release).
pub fn compare(a: &Version, b: &Version) -> std::cmp::Ordering {
    a.cmp(b)
}

/// A version constraint attached to a package specifier or dependency.
///
/// Syntax:
///
/// | Text            | Specifier                  |
/// |-----------------|----------------------------|
/// | (empty)         | `AnyRelease`               |
/// | `*` or `any`    | `Any`                      |
/// | `^X.Y.Z[-pre]`  | `Compatible(X.Y.Z[-pre])`  |
/// | `X.Y.Z[-pre]`   | `Exact(X.Y.Z[-pre])`       |
/// | `X.Y`           | `MinimumCompatible(X.Y.0)` |
///
/// `^X.Y` is accepted as shorthand for `^X.Y.0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionSpecifier {
    /// Matches every version, pre-releases included.
    Any,
    /// Matches every release version.
    AnyRelease,
    /// Matches exactly the given version.
    Exact(Version),
    /// Matches same-major versions at or above the reference. Pre-releases
    /// only match when the reference itself is a pre-release.
    Compatible(Version),
    /// Matches versions with the same major and minor and a patch level at
    /// or above the reference.
    MinimumCompatible(Version),
}

impl VersionSpecifier {
    /// Pin a concrete version as an `Exact` specifier.
    pub fn as_exact(version: &Version) -> Self {
        VersionSpecifier::Exact(version.clone())
    }

    /// Relax a concrete version into a `Compatible` specifier.
    pub fn as_compatible(version: &Version) -> Self {
        VersionSpecifier::Compatible(version.clone())
    }

    /// Does `version` satisfy this specifier?
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        match self {
            VersionSpecifier::Any => true,
            VersionSpecifier::AnyRelease => version.pre.is_empty(),
            VersionSpecifier::Exact(v) => version == v,
            VersionSpecifier::Compatible(v) => {
                version.major == v.major
                    && version >= v
                    && (version.pre.is_empty() || !v.pre.is_empty())
            }
            VersionSpecifier::MinimumCompatible(v) => {
                version.major == v.major
                    && version.minor == v.minor
                    && version.patch >= v.patch
            }
        }
    }

    /// Can some single version satisfy both specifiers?
    pub fn is_compatible(&self, other: &VersionSpecifier) -> bool {
        self.intersect(other).is_some()
    }

    /// The more restrictive of two overlapping specifiers, or `None` when no
    /// version can satisfy both. This is the aggregate-constraint operation
    /// the resolver folds dependency edges with.
    ///
    /// The result is a single-specifier approximation, not an exact
    /// intersection: picking `Compatible(pre)` over a release-only side
    /// drops the release-only bound. Callers that need exactness must keep
    /// the folded specifiers and re-check each one against a candidate, as
    /// the resolver does.
    pub fn intersect(&self, other: &VersionSpecifier) -> Option<VersionSpecifier> {
        use VersionSpecifier::*;

        // Normalize so the more restrictive side comes first.
        if self.rank() < other.rank() {
            return other.intersect(self);
        }

        match (self, other) {
            (a, Any) => Some(a.clone()),
            (AnyRelease, AnyRelease) => Some(AnyRelease),
            (Exact(v), b) => {
                if b.is_satisfied_by(v) {
                    Some(Exact(v.clone()))
                } else {
                    None
                }
            }
            (MinimumCompatible(a), MinimumCompatible(b)) => {
                if a.major == b.major && a.minor == b.minor {
                    let patch = a.patch.max(b.patch);
                    Some(MinimumCompatible(Version::new(a.major, a.minor, patch)))
                } else {
                    None
                }
            }
            (MinimumCompatible(m), Compatible(c)) => {
                if m.major != c.major || m.minor < c.minor {
                    None
                } else if m.minor > c.minor {
                    Some(MinimumCompatible(m.clone()))
                } else {
                    let patch = m.patch.max(c.patch);
                    Some(MinimumCompatible(Version::new(m.major, m.minor, patch)))
                }
            }
            (MinimumCompatible(m), AnyRelease) => Some(MinimumCompatible(m.clone())),
            // Both arms below may return a pre-release reference even when
            // the other side only admits releases; see the method docs.
            (Compatible(a), Compatible(b)) => {
                if a.major == b.major {
                    Some(Compatible(a.clone().max(b.clone())))
                } else {
                    None
                }
            }
            (Compatible(c), AnyRelease) => Some(Compatible(c.clone())),
            // All remaining pairs are covered by the rank normalization above.
            _ => unreachable!("intersect rank normalization"),
        }
    }

    /// True when the specifier explicitly demands a pre-release: an `Exact`
    /// pin of a pre-release, or a range whose reference is a pre-release.
    /// Only such specifiers allow the resolver to select pre-release
    /// candidates.
    pub fn permits_prerelease(&self) -> bool {
        match self {
            VersionSpecifier::Any | VersionSpecifier::AnyRelease => false,
            VersionSpecifier::Exact(v)
            | VersionSpecifier::Compatible(v)
            | VersionSpecifier::MinimumCompatible(v) => !v.pre.is_empty(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            VersionSpecifier::Any => 0,
            VersionSpecifier::AnyRelease => 1,
            VersionSpecifier::Compatible(_) => 2,
            VersionSpecifier::MinimumCompatible(_) => 3,
            VersionSpecifier::Exact(_) => 4,
        }
    }
}

impl FromStr for VersionSpecifier {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Ok(VersionSpecifier::AnyRelease);
        }
        if trimmed == "*" || trimmed.eq_ignore_ascii_case("any") {
            return Ok(VersionSpecifier::Any);
        }

        if let Some(rest) = trimmed.strip_prefix('^') {
            let version = parse_relaxed(rest).ok_or_else(|| parse_error(input))?;
            return Ok(VersionSpecifier::Compatible(version));
        }

        // `X.Y` with no pre-release or build part is a minimum-compatible
        // specifier; everything else must be a full exact version.
        if is_major_minor(trimmed) {
            let version = parse_relaxed(trimmed).ok_or_else(|| parse_error(input))?;
            return Ok(VersionSpecifier::MinimumCompatible(version));
        }

        let version = Version::parse(trimmed).map_err(|e| Error::Parse {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(VersionSpecifier::Exact(version))
    }
}

/// `X.Y` (digits only, single dot) as opposed to a full `X.Y.Z[-pre][+build]`.
fn is_major_minor(s: &str) -> bool {
    let mut parts = s.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(major), Some(minor), None) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

/// Parse `X.Y` or `X.Y.Z[-pre][+build]`, padding a missing patch with zero.
fn parse_relaxed(s: &str) -> Option<Version> {
    if is_major_minor(s) {
        Version::parse(&format!("{}.0", s)).ok()
    } else {
        Version::parse(s).ok()
    }
}

fn parse_error(input: &str) -> Error {
    Error::Parse {
        input: input.to_string(),
        reason: "expected one of '', '*', 'any', '^X.Y.Z', 'X.Y.Z' or 'X.Y'".to_string(),
    }
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpecifier::Any => write!(f, "any"),
            VersionSpecifier::AnyRelease => Ok(()),
            VersionSpecifier::Exact(v) => write!(f, "{}", v),
            VersionSpecifier::Compatible(v) => write!(f, "^{}", v),
            VersionSpecifier::MinimumCompatible(v) => {
                if v.patch == 0 {
                    write!(f, "{}.{}", v.major, v.minor)
                } else {
                    write!(f, "{}.{}.{}", v.major, v.minor, v.patch)
                }
            }
        }
    }
}

impl TryFrom<String> for VersionSpecifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VersionSpecifier> for String {
    fn from(spec: VersionSpecifier) -> Self {
        spec.to_string()
    }
}
