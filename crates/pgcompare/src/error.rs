use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the cause of connectivity and introspection failures.
///
/// Loaders other than [`crate::PostgresLoader`] can report any error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot connect to {endpoint}: {source}")]
    Connectivity {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to introspect schema '{schema}' on {endpoint}: {source}")]
    Introspection {
        endpoint: String,
        schema: String,
        #[source]
        source: BoxError,
    },

    #[error("schema '{schema}' does not exist on {endpoint}")]
    SchemaNotFound { endpoint: String, schema: String },

    #[error("{endpoint} did not complete within {}s", .after.as_secs())]
    Timeout { endpoint: String, after: Duration },

    #[error("task for {endpoint} failed: {message}")]
    TaskFailed { endpoint: String, message: String },
}

impl Error {
    /// Build a connectivity error from any error type.
    pub fn connectivity(endpoint: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Connectivity {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    /// Build an introspection error from any error type.
    pub fn introspection(
        endpoint: impl Into<String>,
        schema: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Introspection {
            endpoint: endpoint.into(),
            schema: schema.into(),
            source: source.into(),
        }
    }

    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Connectivity { .. } => ErrorKind::Connectivity,
            Error::Introspection { .. } | Error::SchemaNotFound { .. } => {
                ErrorKind::Introspection
            }
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::TaskFailed { .. } => ErrorKind::Internal,
        }
    }
}

/// Error classes, used by run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Connectivity,
    Introspection,
    Timeout,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Config => "config",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Introspection => "introspection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Malformed or missing configuration. Always fatal, raised before any
/// database is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("endpoint name must not be empty")]
    EmptyName,

    #[error("endpoint '{endpoint}' has no connection locator")]
    EmptyLocator { endpoint: String },

    #[error("endpoint '{endpoint}' has no user")]
    EmptyUser { endpoint: String },

    #[error("target '{name}' is configured more than once")]
    DuplicateTarget { name: String },

    #[error("no target databases configured")]
    NoTargets,

    #[error("invalid run option: {0}")]
    InvalidOption(String),

    #[error("no .config/pgcompare.styx found in current directory or any parent")]
    NotFound,

    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}
