//! Exchange gateway trait.
//!
//! Provides a trait-based abstraction over the exchange so that:
//! - the executor can be unit tested against scripted responses
//! - live, paper and test exchanges are interchangeable behind `Arc<dyn ...>`

use std::pin::Pin;
use std::sync::Arc;

use rust_decimal::Decimal;

use perpx_core::Symbol;

use crate::error::GatewayResult;
use crate::types::{CancelAck, Depth, NewOrder, OrderAck, OrderSnapshot, PositionSnapshot, Ticker};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Primitive exchange operations required by the executor.
///
/// An `Ok` from `create_order` or `cancel_order` only means the exchange
/// answered; inspect the ack's `accepted` flag.
pub trait ExchangeGateway: Send + Sync {
    fn create_order<'a>(&'a self, order: &'a NewOrder) -> BoxFuture<'a, GatewayResult<OrderAck>>;

    fn cancel_order<'a>(
        &'a self,
        symbol: &'a Symbol,
        order_id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<CancelAck>>;

    fn get_order<'a>(
        &'a self,
        symbol: &'a Symbol,
        order_id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<OrderSnapshot>>;

    fn get_ticker<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<Ticker>>;

    fn get_depth<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<Depth>>;

    fn get_position<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<PositionSnapshot>>;

    fn set_leverage<'a>(
        &'a self,
        symbol: &'a Symbol,
        buy_leverage: Decimal,
        sell_leverage: Decimal,
    ) -> BoxFuture<'a, GatewayResult<()>>;
}

/// Shared, type-erased gateway.
pub type DynGateway = Arc<dyn ExchangeGateway>;
