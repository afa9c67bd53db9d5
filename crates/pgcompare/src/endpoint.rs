//! Database endpoints: where to connect, as whom, and which schema to compare.

use crate::ConfigError;
use pgcompare_schema::DEFAULT_SCHEMA;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::config::Host;

/// Port used in display names when the locator does not specify one.
pub const DEFAULT_PORT: u16 = 5432;

/// Credentials used to connect to an endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login role
    pub user: String,
    password: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: Option<String>) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One database to introspect.
///
/// Immutable once constructed. Build it with [`DatabaseEndpoint::new`], which
/// validates the configuration and derives the display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseEndpoint {
    name: String,
    locator: String,
    credentials: Credentials,
    schema: String,
    display_name: String,
}

impl DatabaseEndpoint {
    /// Create an endpoint.
    ///
    /// `schema` falls back to `public` when absent or blank.
    pub fn new(
        name: impl Into<String>,
        locator: impl Into<String>,
        credentials: Credentials,
        schema: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let locator = locator.into().trim().to_string();
        if locator.is_empty() {
            return Err(ConfigError::EmptyLocator { endpoint: name });
        }

        if credentials.user.trim().is_empty() {
            return Err(ConfigError::EmptyUser { endpoint: name });
        }

        let schema = match schema.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => DEFAULT_SCHEMA.to_string(),
        };

        let display_name = display_name(&name, &locator);

        Ok(Self {
            name,
            locator,
            credentials,
            schema,
            display_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// `name(host:port)`, or the bare name if the locator could not be parsed.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The identity carried by every [`crate::Difference`] involving this endpoint.
    pub fn identity(&self) -> EndpointRef {
        EndpointRef {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            schema: self.schema.clone(),
        }
    }

    /// Locator with any embedded password masked, safe for logs.
    pub fn masked_locator(&self) -> String {
        mask_password(&self.locator)
    }

    /// Build the `tokio_postgres` configuration for this endpoint.
    ///
    /// Explicit credentials override whatever the locator carries.
    pub fn pg_config(&self) -> Result<tokio_postgres::Config, tokio_postgres::Error> {
        let mut config = tokio_postgres::Config::from_str(normalize_locator(&self.locator))?;
        config.user(&self.credentials.user);
        if let Some(password) = self.credentials.password() {
            config.password(password);
        }
        config.application_name("pgcompare");
        Ok(config)
    }
}

impl fmt::Display for DatabaseEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Identity of an endpoint, as recorded on differences and run results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointRef {
    pub name: String,
    pub display_name: String,
    pub schema: String,
}

impl fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Strip a JDBC prefix so `jdbc:postgresql://…` parses like a plain URL.
fn normalize_locator(locator: &str) -> &str {
    locator.strip_prefix("jdbc:").unwrap_or(locator)
}

/// Derive `name(host:port)` from a connection locator.
///
/// Falls back to the bare name when the locator does not parse or names no
/// TCP host.
pub fn display_name(name: &str, locator: &str) -> String {
    let Ok(config) = tokio_postgres::Config::from_str(normalize_locator(locator)) else {
        return name.to_string();
    };

    let Some((index, host)) = config
        .get_hosts()
        .iter()
        .enumerate()
        .find_map(|(i, h)| match h {
            Host::Tcp(host) => Some((i, host.as_str())),
            #[allow(unreachable_patterns)]
            _ => None,
        })
    else {
        return name.to_string();
    };

    let ports = config.get_ports();
    let port = ports
        .get(index)
        .or_else(|| ports.first())
        .copied()
        .unwrap_or(DEFAULT_PORT);

    format!("{}({}:{})", name, host, port)
}

/// Mask the password in a database URL for display.
pub fn mask_password(url: &str) -> String {
    if let Some(start) = url.find("://")
        && let Some(at) = url[start + 3..].find('@').map(|i| i + start + 3)
    {
        let prefix = &url[..start + 3];
        let suffix = &url[at..];
        if let Some(colon) = url[start + 3..at].find(':') {
            let user = &url[start + 3..start + 3 + colon];
            return format!("{}{}:***{}", prefix, user, suffix);
        }
    }
    url.to_string()
}
