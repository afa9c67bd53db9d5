//! Facet types for `.config/pgcompare.styx`.
//!
//! ```styx
//! base {
//!     name prod
//!     url "postgres://prod-db:5432/app"
//!     user app
//!     password secret
//! }
//! targets (
//!     {name staging, url "postgres://staging-db:5432/app", user app, schema tenant_a}
//! )
//! run {
//!     workers 8
//!     batch-size 10
//!     target-timeout-secs 300
//!     connect-timeout-secs 10
//! }
//! ```

use facet::Facet;

/// Top-level configuration.
#[derive(Debug, Clone, Facet)]
pub struct Config {
    /// The reference database.
    pub base: EndpointConfig,

    /// Databases compared against the base.
    #[facet(default)]
    pub targets: Vec<EndpointConfig>,

    /// Concurrency and timeout settings.
    #[facet(default)]
    pub run: RunConfig,
}

/// One database endpoint.
#[derive(Debug, Clone, Facet)]
pub struct EndpointConfig {
    /// Unique name, used in reports.
    pub name: String,

    /// Connection URL: `postgres://`, `jdbc:postgresql://` or libpq key/value.
    pub url: String,

    /// Login role.
    pub user: String,

    #[facet(default)]
    pub password: Option<String>,

    /// Schema to compare (default: `public`).
    #[facet(default)]
    pub schema: Option<String>,
}

/// Run settings. Anything left out uses the built-in default.
#[derive(Debug, Clone, Default, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct RunConfig {
    /// Maximum number of targets compared concurrently.
    #[facet(default)]
    pub workers: Option<usize>,

    /// Number of targets submitted per batch.
    #[facet(default)]
    pub batch_size: Option<usize>,

    /// Per-target timeout in seconds. `0` disables it.
    #[facet(default)]
    pub target_timeout_secs: Option<u64>,

    /// Connection timeout in seconds.
    #[facet(default)]
    pub connect_timeout_secs: Option<u64>,

    /// How long workers get to stop at the end of a run, in seconds.
    #[facet(default)]
    pub shutdown_grace_secs: Option<u64>,
}
