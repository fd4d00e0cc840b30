//! Executor error types.

use perpx_core::{CoreError, OrderSide, PositionEffect};
use perpx_gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The exchange did not acknowledge the order. No instance exists.
    #[error("Order submission rejected for {symbol}: {message}")]
    SubmissionRejected { symbol: String, message: String },

    #[error("Unrecognized order state {raw:?} for {side}/{effect}")]
    UnrecognizedState {
        raw: String,
        side: OrderSide,
        effect: PositionEffect,
    },

    /// A gateway call failed and no snapshot was available to fall back on.
    /// `order_id` is set when the exchange had already accepted the order.
    #[error(
        "Gateway {operation} failed (order {}): {source}",
        .order_id.as_deref().unwrap_or("none")
    )]
    Gateway {
        operation: &'static str,
        order_id: Option<String>,
        #[source]
        source: GatewayError,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Execution aborted before submission")]
    Aborted,
}

impl From<CoreError> for ExecutorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnrecognizedState { raw, side, effect } => {
                Self::UnrecognizedState { raw, side, effect }
            }
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
