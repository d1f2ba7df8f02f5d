mod database;

pub use database::DatabaseUrl;

use crate::readiness::RetryPolicy;
use std::env;
use std::fmt;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_WAIT_ATTEMPTS: u32 = 30;
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(2);

/// Distinguishes runtime behavior for different stages of the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "testing" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration, read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub database: DatabaseConfig,
    pub readiness: RetryPolicy,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("FLASK_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let url = match env::var("DATABASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(DatabaseUrl::parse(&raw)?),
            _ => None,
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort)?,
            Err(_) => DEFAULT_PORT,
        };

        let max_attempts = match env::var("DB_WAIT_ATTEMPTS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidWaitAttempts(raw))?,
            Err(_) => DEFAULT_WAIT_ATTEMPTS,
        };

        let interval = match env::var("DB_WAIT_INTERVAL") {
            Ok(raw) => humantime::parse_duration(raw.trim())
                .map_err(|source| ConfigError::InvalidWaitInterval { value: raw, source })?,
            Err(_) => DEFAULT_WAIT_INTERVAL,
        };

        Ok(Self {
            environment,
            database: DatabaseConfig { url },
            readiness: RetryPolicy::new(max_attempts, interval),
            server: ServerConfig { port },
            telemetry: TelemetryConfig::load(),
        })
    }
}

/// Connection settings for the relational store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<DatabaseUrl>,
}

impl DatabaseConfig {
    pub fn require_url(&self) -> Result<&DatabaseUrl, ConfigError> {
        self.url.as_ref().ok_or(ConfigError::MissingDatabaseUrl)
    }
}

/// Port the web backend is deployed on. Read for logging only.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl TelemetryConfig {
    /// Reads only `LOG_LEVEL`; offline commands use this instead of
    /// [`AppConfig::load`].
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        let log_level = env::var("LOG_LEVEL")
            .map(|level| level.to_ascii_lowercase())
            .unwrap_or_else(|_| "info".to_string());
        Self { log_level }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingDatabaseUrl,
    InvalidDatabaseUrl(String),
    UnsupportedDatabaseScheme(String),
    InvalidPort,
    InvalidWaitAttempts(String),
    InvalidWaitInterval {
        value: String,
        source: humantime::DurationError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingDatabaseUrl => write!(f, "DATABASE_URL must be set"),
            ConfigError::InvalidDatabaseUrl(url) => {
                write!(f, "DATABASE_URL '{}' is not a valid connection URL", url)
            }
            ConfigError::UnsupportedDatabaseScheme(scheme) => write!(
                f,
                "DATABASE_URL scheme '{}' is not supported (expected postgres or postgresql)",
                scheme
            ),
            ConfigError::InvalidPort => write!(f, "PORT must be a valid u16"),
            ConfigError::InvalidWaitAttempts(value) => {
                write!(f, "DB_WAIT_ATTEMPTS must be a positive integer, got '{}'", value)
            }
            ConfigError::InvalidWaitInterval { value, .. } => {
                write!(f, "DB_WAIT_INTERVAL '{}' is not a valid duration", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidWaitInterval { source, .. } => Some(source),
            _ => None,
        }
    }
}
