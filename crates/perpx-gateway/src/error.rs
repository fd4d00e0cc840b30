//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Exchange rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The order already reached a final state on the exchange.
    #[error("Order not cancellable: {0}")]
    NotCancellable(String),
}

impl GatewayError {
    /// Network/timeout failures that say nothing about the order itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(GatewayError::Transport("reset".into()).is_transient());
        assert!(!GatewayError::OrderNotFound("1".into()).is_transient());
        assert!(!GatewayError::NotCancellable("1".into()).is_transient());
        assert!(!GatewayError::Rejected {
            code: 10001,
            message: "bad".into()
        }
        .is_transient());
    }
}
