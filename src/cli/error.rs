//! CLI error types and conversions

use crate::dispatcher::ConfigError;
use crate::limiter::LimiterError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Limiter error
    #[error("limiter error: {0}")]
    LimiterError(#[from] LimiterError),

    /// Dispatcher configuration error
    #[error("dispatch configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
