//! Configuration file handling for pgcompare.
//!
//! Looks for `.config/pgcompare.styx` in the current directory or any parent directory.

pub use pgcompare_config::{Config, EndpointConfig, RunConfig};

use pgcompare::{ConfigError, Credentials, DatabaseEndpoint, PostgresLoader, RunOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = ".config/pgcompare.styx";

/// Load configuration from `.config/pgcompare.styx`, searching up the directory tree.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io {
        path: ".".to_string(),
        message: e.to_string(),
    })?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let config = load_file(&config_path)?;
    Ok((config, config_path))
}

/// Load configuration from an explicit path.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse(&content, path)
}

fn parse(content: &str, path: &Path) -> Result<Config, ConfigError> {
    facet_styx::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Find `.config/pgcompare.styx` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Build the base endpoint and the target endpoints.
pub fn endpoints(
    config: &Config,
) -> Result<(DatabaseEndpoint, Vec<DatabaseEndpoint>), ConfigError> {
    let base = endpoint(&config.base)?;
    let targets = config
        .targets
        .iter()
        .map(endpoint)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((base, targets))
}

fn endpoint(config: &EndpointConfig) -> Result<DatabaseEndpoint, ConfigError> {
    DatabaseEndpoint::new(
        &config.name,
        &config.url,
        Credentials::new(&config.user, config.password.clone()),
        config.schema.as_deref(),
    )
}

/// Run options from the file, with defaults for anything left out.
pub fn run_options(config: &RunConfig) -> RunOptions {
    let defaults = RunOptions::default();
    RunOptions {
        workers: config.workers.unwrap_or(defaults.workers),
        batch_size: config.batch_size.unwrap_or(defaults.batch_size),
        target_timeout: match config.target_timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.target_timeout,
        },
        shutdown_grace: config
            .shutdown_grace_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.shutdown_grace),
    }
}

/// The Postgres loader, with the configured connect timeout. `0` disables it.
pub fn loader(config: &RunConfig) -> PostgresLoader {
    let loader = PostgresLoader::new();
    match config.connect_timeout_secs {
        Some(secs) => loader.with_connect_timeout(Duration::from_secs(secs)),
        None => loader,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
base {
    name prod
    url "postgres://prod-db:5432/app"
    user app
    password secret
}
targets (
    {name staging, url "postgres://staging-db:5432/app", user app, schema tenant_a}
    {name replica, url "jdbc:postgresql://10.0.0.7/app", user reader}
)
run {
    workers 4
    batch-size 5
    target-timeout-secs 0
}
"#;

    fn sample() -> Config {
        parse(SAMPLE, Path::new("pgcompare.styx")).unwrap()
    }

    #[test]
    fn test_parse_config() {
        let config = sample();
        assert_eq!(config.base.name, "prod");
        assert_eq!(config.base.password.as_deref(), Some("secret"));
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].schema.as_deref(), Some("tenant_a"));
        assert_eq!(config.targets[1].password, None);
        assert_eq!(config.run.workers, Some(4));
        assert_eq!(config.run.batch_size, Some(5));
        assert_eq!(config.run.connect_timeout_secs, None);
    }

    #[test]
    fn test_endpoints_from_config() {
        let (base, targets) = endpoints(&sample()).unwrap();
        assert_eq!(base.display_name(), "prod(prod-db:5432)");
        assert_eq!(base.schema(), "public");
        assert_eq!(targets[0].schema(), "tenant_a");
        assert_eq!(targets[1].display_name(), "replica(10.0.0.7:5432)");
    }

    #[test]
    fn test_run_options_from_config() {
        let options = run_options(&sample().run);
        assert_eq!(options.workers, 4);
        assert_eq!(options.batch_size, 5);
        assert_eq!(options.target_timeout, None);
        assert_eq!(options.shutdown_grace, RunOptions::default().shutdown_grace);

        assert_eq!(run_options(&RunConfig::default()), RunOptions::default());
    }

    #[test]
    fn test_connect_timeout_from_config() {
        let default = loader(&RunConfig::default());
        assert_eq!(default.connect_timeout(), PostgresLoader::new().connect_timeout());

        let short = loader(&RunConfig {
            connect_timeout_secs: Some(3),
            ..Default::default()
        });
        assert_eq!(short.connect_timeout(), Some(Duration::from_secs(3)));

        let disabled = loader(&RunConfig {
            connect_timeout_secs: Some(0),
            ..Default::default()
        });
        assert_eq!(disabled.connect_timeout(), None);
    }

    #[test]
    fn test_blank_user_rejected() {
        let mut config = sample();
        config.targets[1].user = " ".to_string();
        assert_eq!(
            endpoints(&config).unwrap_err(),
            ConfigError::EmptyUser {
                endpoint: "replica".to_string()
            }
        );
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse("base {", Path::new("broken.styx")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "broken.styx"));
    }

    #[test]
    fn test_find_config_file_searches_parents() {
        let root = std::env::temp_dir().join(format!("pgcompare-config-{}", std::process::id()));
        let nested = root.join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(root.join(".config")).unwrap();
        std::fs::write(root.join(CONFIG_FILE), SAMPLE).unwrap();

        let (config, path) = load_from(&nested).unwrap();
        assert_eq!(path, root.join(CONFIG_FILE));
        assert_eq!(config.targets.len(), 2);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
