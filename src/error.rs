use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Version parsing error: {0}")]
    SemVer(#[from] semver::Error),

    #[error("Invalid version specifier '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("No variant of '{name}' is compatible with {os}/{arch}\n\n\
             Hint: the package exists, but every published version targets a\n\
             different operating system or CPU architecture.\n\n\
             Try: rigpm image install ... --OS <name> --Architecture <arch>")]
    NoCompatibleVariant {
        name: String,
        os: String,
        arch: String,
    },

    #[error("Conflicting version specifiers for '{name}': '{left}' and '{right}' \
             cannot be satisfied by any single version")]
    ConstraintIntersectionEmpty {
        name: String,
        left: String,
        right: String,
    },

    #[error("Dependency resolution failed:\n\n{}\n\n\
             Hint: this usually means conflicting version requirements.\n\n\
             Possible solutions:\n\
             1. Check the image for incompatible version specifiers\n\
             2. Loosen specifiers to compatible ranges (^X.Y.Z)\n\
             3. Inspect the diagnostic graph below with Graphviz\n\n{}",
             .conflicts.join("\n"), .graph)]
    Unsatisfiable {
        conflicts: Vec<String>,
        graph: String,
    },

    #[error("Resolution cancelled")]
    Cancelled,

    #[error("Repository {url}: {message}")]
    Repository {
        url: String,
        message: String,
        transient: bool,
    },

    #[error("Invalid image document: {0}")]
    InvalidImage(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the package-dependency error family, which the CLI maps to
    /// its own exit code.
    pub fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            Error::PackageNotFound(_)
                | Error::NoCompatibleVariant { .. }
                | Error::ConstraintIntersectionEmpty { .. }
                | Error::Unsatisfiable { .. }
        )
    }

    /// Inner messages of an aggregate resolution failure, one per conflict.
    /// Other errors yield their display form as a single line.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Error::Unsatisfiable { conflicts, .. } if !conflicts.is_empty() => conflicts.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Other(format!("HTTP error: {}", e))
    }
}
