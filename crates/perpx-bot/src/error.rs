//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load failed: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Invalid input: {0}")]
    Core(#[from] perpx_core::CoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] perpx_gateway::GatewayError),

    #[error("Executor error: {0}")]
    Executor(#[from] perpx_executor::ExecutorError),

    #[error("Position error: {0}")]
    Position(#[from] perpx_position::PositionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] perpx_telemetry::TelemetryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
