//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PAPERBACK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `PAPERBACK_HOST` - Bind address (default: 127.0.0.1)
//! - `PAPERBACK_PORT` - Listen port (default: 4000)
//! - `PAPERBACK_ENV` - Environment name reported by `/healthcheck` (default: development)
//! - `PAPERBACK_BASE_URL` - Public URL, used in activation links (default: <http://localhost:4000>)
//! - `PAPERBACK_INSECURE_COOKIES` - Drop the `Secure` cookie attribute when set to `1` or
//!   `true`, for plain-HTTP development only
//! - `PAPERBACK_DB_MAX_CONNECTIONS` - Pool ceiling (default: 25)
//! - `PAPERBACK_DB_MIN_CONNECTIONS` - Pool floor (default: 2)
//! - `PAPERBACK_QUERY_TIMEOUT_SECS` - Per-operation storage deadline (default: 3)
//! - `PAPERBACK_SHUTDOWN_GRACE_SECS` - Drain window on shutdown (default: 30)
//! - `PAPERBACK_ACTIVATION_TOKEN_TTL_HOURS` - Activation token lifetime (default: 72)
//! - `PAPERBACK_ARGON2_MEMORY_KIB` - Argon2id memory cost (default: 19456)
//! - `PAPERBACK_ARGON2_ITERATIONS` - Argon2id time cost (default: 2)
//! - `PAPERBACK_ARGON2_PARALLELISM` - Argon2id lanes (default: 1)
//! - `PAPERBACK_LOG_JSON` - Emit JSON logs when set to `1` or `true`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment name
    pub environment: String,
    /// Public base URL
    pub base_url: Url,
    pub database: DatabaseConfig,
    pub password: PasswordConfig,
    /// How long in-flight requests and background tasks may take to finish
    pub shutdown_grace: Duration,
    /// Lifetime of a freshly issued activation token
    pub activation_token_ttl: Duration,
    /// Omit the `Secure` attribute from session and CSRF cookies
    pub insecure_cookies: bool,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Connection pool and query settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Deadline applied to every repository call
    pub query_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 25,
            min_connections: 2,
            query_timeout: Duration::from_secs(3),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PAPERBACK_DATABASE_URL")?;
        let host = parse_env("PAPERBACK_HOST", "127.0.0.1")?;
        let port = parse_env("PAPERBACK_PORT", "4000")?;
        let environment = get_env_or_default("PAPERBACK_ENV", "development");
        let base_url = parse_env("PAPERBACK_BASE_URL", "http://localhost:4000")?;

        let database = DatabaseConfig {
            max_connections: parse_env("PAPERBACK_DB_MAX_CONNECTIONS", "25")?,
            min_connections: parse_env("PAPERBACK_DB_MIN_CONNECTIONS", "2")?,
            query_timeout: Duration::from_secs(parse_env("PAPERBACK_QUERY_TIMEOUT_SECS", "3")?),
        };
        if database.min_connections > database.max_connections {
            return Err(ConfigError::InvalidEnvVar(
                "PAPERBACK_DB_MIN_CONNECTIONS".to_string(),
                "must not exceed PAPERBACK_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        let password = PasswordConfig {
            memory_kib: parse_env("PAPERBACK_ARGON2_MEMORY_KIB", "19456")?,
            iterations: parse_env("PAPERBACK_ARGON2_ITERATIONS", "2")?,
            parallelism: parse_env("PAPERBACK_ARGON2_PARALLELISM", "1")?,
        };

        let shutdown_grace =
            Duration::from_secs(parse_env("PAPERBACK_SHUTDOWN_GRACE_SECS", "30")?);
        let ttl_hours: u64 = parse_env("PAPERBACK_ACTIVATION_TOKEN_TTL_HOURS", "72")?;
        let activation_token_ttl = Duration::from_secs(ttl_hours * 60 * 60);

        let insecure_cookies = get_flag("PAPERBACK_INSECURE_COOKIES");
        let log_json = get_flag("PAPERBACK_LOG_JSON");

        Ok(Self {
            database_url,
            host,
            port,
            environment,
            base_url,
            database,
            password,
            shutdown_grace,
            activation_token_ttl,
            insecure_cookies,
            log_json,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Defaults for a local plain-HTTP instance talking to `database_url`.
    #[must_use]
    pub fn local(database_url: &str) -> Self {
        Self {
            database_url: SecretString::from(database_url.to_owned()),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 4000,
            environment: "development".to_string(),
            base_url: Url::from_str("http://localhost:4000")
                .unwrap_or_else(|e| unreachable!("literal URL parses: {e}")),
            database: DatabaseConfig::default(),
            password: PasswordConfig::default(),
            shutdown_grace: Duration::from_secs(30),
            activation_token_ttl: Duration::from_secs(72 * 60 * 60),
            insecure_cookies: true,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub const fn secure_cookies(&self) -> bool {
        !self.insecure_cookies
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// A boolean switch that is on when set to `1` or `true`.
fn get_flag(key: &str) -> bool {
    get_optional_env(key).is_some_and(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
