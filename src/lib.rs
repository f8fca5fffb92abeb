//! rigpm - Package image resolver for plugin-based test-automation runtimes
//!
//! A test rig installation is described declaratively as an *image*: a list
//! of package specifiers with version constraints, a target OS and CPU
//! architecture, and the repositories to draw candidates from. rigpm
//! resolves an image into a concrete, internally consistent set of package
//! versions ready for deployment:
//!
//! - Transitive dependency resolution by backtracking search, deterministic
//!   across runs and platforms
//! - Semantic-version algebra with exact, compatible (`^X.Y.Z`) and
//!   minimum-compatible (`X.Y`) specifiers
//! - OS and CPU-architecture compatibility enforcement
//! - Merge mode that treats the current installation as soft constraints
//! - Conflict reports plus a Graphviz diagnostic graph on failure
//!
//! # Examples
//!
//! ```no_run
//! use rigpm::{
//!     CancellationToken, DependencyGraph, ImageSpecifier, PackageSpecifier, Repository,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = ImageSpecifier::builder()
//!     .os("linux")
//!     .architecture(rigpm::CpuArchitecture::X64)
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
//!
//! for package in image.packages() {
//!     println!("{}", package);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`version`] - Semantic versions and version specifiers
//! - [`package`] - Package definitions, identities and specifiers
//! - [`repository`] - File- and HTTP-backed repository clients
//! - [`cache`] - Dependency cache populated ahead of resolution
//! - [`resolver`] - The backtracking image resolver
//! - [`image`] - Image specifiers and immutable image identifiers
//! - [`merge`] - Merge an existing installation with new specifiers
//! - [`document`] - Image document parsing (XML, JSON, inline list)
//! - [`lock`] - Resolved-image lock document
//! - [`diagnostic`] - Conflict reports and Dot graph rendering
//! - [`config`] - User configuration management
//! - [`platform`] - Host OS and architecture detection
//! - [`error`] - Error types and result handling

pub mod cache;
pub mod cancel;
pub mod config;
pub mod diagnostic;
pub mod document;
pub mod error;
pub mod image;
pub mod lock;
pub mod merge;
pub mod package;
pub mod platform;
pub mod repository;
pub mod repository_http;
pub mod resolver;
pub mod version;

pub use cache::DependencyGraph;
pub use cancel::CancellationToken;
pub use config::Config;
pub use diagnostic::{ConflictReport, DotGraph};
pub use document::ImageDocument;
pub use error::{Error, Result};
pub use image::{ImageIdentifier, ImageSpecifier, ImageSpecifierBuilder};
pub use lock::{ImageLock, LOCK_FILE_NAME};
pub use merge::merge;
pub use package::{
    CpuArchitecture, PackageDef, PackageDependency, PackageIdentity, PackageSpecifier,
};
pub use platform::{detect_host_architecture, detect_host_os};
pub use repository::{FileRepository, PackageEntry, PackageIndex, PackageRecord, Repository};
pub use repository_http::HttpRepository;
pub use resolver::{resolve_image, ImageResolution, ResolveHook, Resolver};
pub use version::{compare, parse_specifier, parse_version, VersionSpecifier};
