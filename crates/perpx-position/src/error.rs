//! Position error types.

use perpx_executor::ExecutorError;
use perpx_gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PositionError {
    /// The two legs do not describe a reversal.
    #[error("Invalid reversal legs: {0}")]
    InvalidLegs(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

pub type PositionResult<T> = Result<T, PositionError>;
