use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    DatabaseSettings, GatewaySettings, LoggingSettings, PoolSettings, ServerSettings, Settings,
};

/// Prefix for structured environment overrides, e.g. `SQLGATE__POOL__MAX_CONNECTIONS`.
pub const ENV_PREFIX: &str = "SQLGATE";

/// Default file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sqlgate.toml";

/// Flat variables understood by older deployments, mapped onto settings keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("MYSQL_HOST", "database.host"),
    ("MYSQL_PORT", "database.port"),
    ("MYSQL_USER", "database.user"),
    ("MYSQL_PASSWORD", "database.password"),
    ("MYSQL_DATABASE", "database.name"),
    ("PORT", "server.port"),
    ("CORS_ORIGIN", "server.cors_origin"),
];

/// Loads the application configuration from the process environment.
///
/// This function is the primary entry point for this crate. Sources are layered
/// from lowest to highest precedence: built-in defaults, the TOML file (`path`,
/// or an optional `sqlgate.toml`), `SQLGATE__SECTION__KEY` variables, and finally
/// the legacy `MYSQL_*` / `PORT` / `CORS_ORIGIN` variables.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let env: HashMap<String, String> = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect();
    load_config_with_env(path, &env)
}

/// Same as [`load_config`] but reads variables from `env` instead of the process.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: &HashMap<String, String>,
) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let structured: config::Map<String, String> = env
        .iter()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut builder = config::Config::builder().add_source(file).add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(Some(structured)),
    );

    for (var, key) in LEGACY_ENV {
        let value = env.get(*var).filter(|v| !v.is_empty()).cloned();
        builder = builder.set_override_option(*key, value)?;
    }

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.build()?.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Backend, ErrorDetail};
    use std::io::Write;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write toml");
        file
    }

    #[test]
    fn defaults_apply_without_any_source() {
        // `with_name` lookups are relative to the working directory, so use an
        // explicit empty file to keep the test hermetic.
        let file = write_toml("");
        let settings = load_config_with_env(Some(file.path()), &env(&[])).unwrap();

        assert_eq!(settings.database.backend, Backend::Mysql);
        assert_eq!(settings.database.port(), Some(3306));
        assert_eq!(settings.pool.max_connections, 10);
        assert_eq!(
            settings.pool.acquire_timeout(),
            Some(Duration::from_millis(10_000))
        );
        assert!(settings.gateway.allow_passthrough);
        assert_eq!(settings.gateway.error_detail, ErrorDetail::Verbatim);
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server.route_prefix, "/api/mysql");
        assert_eq!(settings.server.cors_origin, "*");
    }

    #[test]
    fn toml_file_is_read() {
        let file = write_toml(
            r#"
            [database]
            backend = "postgres"
            host = "db.internal"
            name = "inventory"

            [pool]
            max_connections = 4
            acquire_timeout_ms = 0

            [gateway]
            error_detail = "redacted"
            "#,
        );

        let settings = load_config_with_env(Some(file.path()), &env(&[])).unwrap();
        assert_eq!(settings.database.backend, Backend::Postgres);
        assert_eq!(settings.database.host, "db.internal");
        assert_eq!(settings.database.port(), Some(5432));
        assert_eq!(settings.pool.max_connections, 4);
        assert_eq!(settings.pool.acquire_timeout(), None);
        assert_eq!(settings.gateway.error_detail, ErrorDetail::Redacted);
    }

    #[test]
    fn structured_env_overrides_file() {
        let file = write_toml("[pool]\nmax_connections = 4\n");
        let settings = load_config_with_env(
            Some(file.path()),
            &env(&[
                ("SQLGATE__POOL__MAX_CONNECTIONS", "7"),
                ("SQLGATE__GATEWAY__ALLOW_PASSTHROUGH", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.pool.max_connections, 7);
        assert!(!settings.gateway.allow_passthrough);
    }

    #[test]
    fn legacy_variables_win() {
        let file = write_toml("[database]\nhost = \"from-file\"\n");
        let settings = load_config_with_env(
            Some(file.path()),
            &env(&[
                ("SQLGATE__DATABASE__HOST", "from-structured"),
                ("MYSQL_HOST", "from-legacy"),
                ("MYSQL_PORT", "3307"),
                ("MYSQL_DATABASE", "shop"),
                ("MYSQL_PASSWORD", "hunter2"),
                ("PORT", "8080"),
                ("CORS_ORIGIN", "https://app.example.com"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.database.host, "from-legacy");
        assert_eq!(settings.database.port(), Some(3307));
        assert_eq!(settings.database.name, "shop");
        assert_eq!(settings.database.password, "hunter2");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.cors_origin, "https://app.example.com");
    }

    #[test]
    fn empty_legacy_variables_are_ignored() {
        let file = write_toml("[database]\nhost = \"from-file\"\n");
        let settings =
            load_config_with_env(Some(file.path()), &env(&[("MYSQL_HOST", "")])).unwrap();
        assert_eq!(settings.database.host, "from-file");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = load_config_with_env(Some(&path), &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let file = write_toml("[pool]\nmax_connections = 0\n");
        let err = load_config_with_env(Some(file.path()), &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
