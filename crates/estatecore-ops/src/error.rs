use crate::bootstrap::BootstrapError;
use crate::config::ConfigError;
use crate::loader::LoadError;
use crate::readiness::{ProbeError, ReadinessError};
use crate::telemetry::TelemetryError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Database(tokio_postgres::Error),
    Readiness(ReadinessError<ProbeError>),
    Bootstrap(BootstrapError),
    Load(LoadError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Database(err) => write!(f, "database error: {}", err),
            AppError::Readiness(err) => write!(f, "readiness error: {}", err),
            AppError::Bootstrap(err) => write!(f, "schema bootstrap error: {}", err),
            AppError::Load(err) => write!(f, "bulk load error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Database(err) => Some(err),
            AppError::Readiness(err) => Some(err),
            AppError::Bootstrap(err) => Some(err),
            AppError::Load(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(value: tokio_postgres::Error) -> Self {
        Self::Database(value)
    }
}

impl From<ReadinessError<ProbeError>> for AppError {
    fn from(value: ReadinessError<ProbeError>) -> Self {
        Self::Readiness(value)
    }
}

impl From<BootstrapError> for AppError {
    fn from(value: BootstrapError) -> Self {
        Self::Bootstrap(value)
    }
}

impl From<LoadError> for AppError {
    fn from(value: LoadError) -> Self {
        Self::Load(value)
    }
}
