//! Structural schema comparison for PostgreSQL fleets.
//!
//! This crate provides:
//! - [`diff`], a deterministic comparison of two [`SchemaSnapshot`]s
//! - [`PostgresLoader`], which captures snapshots from live databases
//! - [`Orchestrator`], which compares one base database against many targets
//!   concurrently and isolates per-target failures
//!
//! # Example
//!
//! ```ignore
//! use pgcompare::{Credentials, DatabaseEndpoint, Orchestrator, PostgresLoader};
//!
//! let base = DatabaseEndpoint::new(
//!     "prod",
//!     "postgres://prod-db:5432/app",
//!     Credentials::new("app", None),
//!     None,
//! )?;
//! let targets = vec![DatabaseEndpoint::new(
//!     "staging",
//!     "postgres://staging-db:5432/app",
//!     Credentials::new("app", None),
//!     Some("tenant_a"),
//! )?];
//!
//! let report = Orchestrator::new(PostgresLoader::new()).run(&base, &targets).await?;
//! for outcome in &report.outcomes {
//!     for difference in &outcome.differences {
//!         println!("[{}] {}", difference.severity(), difference);
//!     }
//! }
//! ```

mod diff;
mod difference;
mod endpoint;
mod error;
mod introspect;
mod loader;
mod orchestrator;
mod summary;
mod traced;

pub use diff::diff;
pub use difference::{Difference, DifferenceKind, PRIMARY_KEY_ITEM, Severity, UnknownKind};
pub use endpoint::{
    Credentials, DEFAULT_PORT, DatabaseEndpoint, EndpointRef, display_name, mask_password,
};
pub use error::{BoxError, ConfigError, Error, ErrorKind};
pub use introspect::{PostgresLoader, introspect};
pub use loader::{BoxFuture, SchemaLoader};
pub use orchestrator::{
    DiffFn, Orchestrator, RunEvent, RunOptions, RunReport, RunResult, TargetOutcome,
};
pub use summary::{FailedTarget, ProblemTarget, RunSummary, SeverityCounts, TargetSummary};
pub use traced::{Connection, ConnectionExt, TracedConn};

pub use pgcompare_schema::{
    ColumnDescriptor, DEFAULT_SCHEMA, IndexDescriptor, SchemaSnapshot, TableDescriptor, TableType,
};

pub type Result<T> = std::result::Result<T, Error>;
