use crate::error::ConfigError;
use core_types::{Backend, ErrorDetail};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub pool: PoolSettings,
    pub gateway: GatewaySettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// Where the pool connects to and with which credentials.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: Backend,
    pub host: String,
    /// Falls back to the backend's standard port when unset.
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    /// Database (schema) name. For SQLite this is the file path, or `:memory:`.
    pub name: String,
    /// Upper bound on opening a single connection.
    pub connect_timeout_ms: u64,
}

/// Capacity and wait policy of the connection pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: usize,
    /// How long a caller may queue for a connection. `0` waits forever.
    pub acquire_timeout_ms: u64,
}

/// Switches on the query gateway's trust boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Whether caller-supplied SQL may be executed at all.
    pub allow_passthrough: bool,
    pub error_detail: ErrorDetail,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Path under which the test/tables/query routes are mounted.
    pub route_prefix: String,
    /// `*` allows any origin; otherwise a comma-separated list of origins.
    pub cors_origin: String,
    /// Abort startup when the initial health check fails.
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub json: bool,
    /// When set, logs go to a daily-rolling file in this directory instead of stdout.
    pub directory: Option<PathBuf>,
}

// --- Default Implementations ---

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Mysql,
            host: "localhost".to_string(),
            port: None,
            user: "root".to_string(),
            password: String::new(),
            name: String::new(),
            connect_timeout_ms: 5_000,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_ms: 10_000,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            allow_passthrough: true,
            error_detail: ErrorDetail::Verbatim,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            route_prefix: "/api/mysql".to_string(),
            cors_origin: "*".to_string(),
            fail_fast: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=info".to_string(),
            json: false,
            directory: None,
        }
    }
}

// The password must never reach a log line.
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

impl DatabaseSettings {
    pub fn port(&self) -> Option<u16> {
        self.port.or_else(|| self.backend.default_port())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl PoolSettings {
    /// `None` means an acquisition may wait indefinitely.
    pub fn acquire_timeout(&self) -> Option<Duration> {
        (self.acquire_timeout_ms > 0).then(|| Duration::from_millis(self.acquire_timeout_ms))
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            ConfigError::ValidationError(format!("server.host `{}` is not an IP address", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Allowed CORS origins, or `None` when any origin is accepted.
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        let origin = self.cors_origin.trim();
        if origin.is_empty() || origin == "*" {
            return None;
        }
        Some(
            origin
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        )
    }
}

impl Settings {
    /// Rejects combinations that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "pool.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.backend.is_networked() && self.database.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "database.host is required for the {} backend",
                self.database.backend
            )));
        }
        if self.database.backend == Backend::Sqlite && self.database.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.name must be a file path or `:memory:` for sqlite".to_string(),
            ));
        }
        let prefix = &self.server.route_prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "server.route_prefix `{prefix}` must start with `/` and not end with one"
            )));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let settings = DatabaseSettings {
            password: "s3cret".to_string(),
            ..Default::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn cors_origins_parse() {
        let mut server = ServerSettings::default();
        assert_eq!(server.cors_origins(), None);

        server.cors_origin = "https://a.example, https://b.example".to_string();
        assert_eq!(
            server.cors_origins(),
            Some(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn sqlite_requires_a_name() {
        let mut settings = Settings::default();
        settings.database.backend = Backend::Sqlite;
        assert!(settings.validate().is_err());

        settings.database.name = ":memory:".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn route_prefix_shape_is_checked() {
        let mut settings = Settings::default();
        for bad in ["api", "/", "/api/"] {
            settings.server.route_prefix = bad.to_string();
            assert!(settings.validate().is_err(), "{bad} should be rejected");
        }
        settings.server.route_prefix = "/api/db".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn unparseable_host_is_rejected() {
        let mut settings = Settings::default();
        settings.server.host = "localhost".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
