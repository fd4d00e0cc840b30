//! Core domain types for the perpx order execution stack.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `Symbol`, `OrderSide`, `PositionEffect`, `OrderType`, `TimeInForce`: Trading enums
//! - `OrderRequest`: One logical order intention
//! - `OrderRecord`: Observed state of one order instance on the exchange
//! - [`translate`]: Raw exchange status to domain status mapping

pub mod decimal;
pub mod error;
pub mod order;
pub mod status;

pub use decimal::{Price, Size};
pub use error::{CoreError, CoreResult};
pub use order::{
    ClientOrderId, OrderRequest, OrderSide, OrderType, PositionEffect, Symbol, TimeInForce,
};
pub use status::{translate, ActionLabel, DomainStatus, OrderRecord, RawOrderStatus, Translation};
