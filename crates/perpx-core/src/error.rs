//! Error types for perpx-core.

use thiserror::Error;

use crate::order::{OrderSide, PositionEffect};

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The exchange reported an order state outside the known table.
    #[error("Unrecognized order state {raw:?} for {side}/{effect}")]
    UnrecognizedState {
        raw: String,
        side: OrderSide,
        effect: PositionEffect,
    },

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
