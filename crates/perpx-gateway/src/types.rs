//! Wire-neutral request and response types exchanged with a gateway.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use perpx_core::{
    ClientOrderId, OrderRequest, OrderSide, OrderType, Price, Size, Symbol, TimeInForce,
};

/// Order submission parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub close_on_trigger: bool,
    pub client_order_id: ClientOrderId,
}

impl NewOrder {
    /// Submission for one instance of `request`, with a fresh client order ID.
    pub fn from_request(request: &OrderRequest) -> Self {
        Self {
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price,
            size: request.size,
            order_type: request.order_type,
            time_in_force: request.time_in_force,
            reduce_only: request.effect.reduce_only(),
            close_on_trigger: request.effect.close_on_trigger(),
            client_order_id: ClientOrderId::new(),
        }
    }
}

/// Exchange-level acceptance of a submission. Not a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub accepted: bool,
    pub order_id: Option<String>,
    pub message: String,
}

impl OrderAck {
    pub fn accepted(order_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            order_id: Some(order_id.into()),
            message: "OK".to_string(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            order_id: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    pub accepted: bool,
    pub message: String,
}

impl CancelAck {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            message: "OK".to_string(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// Exchange view of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub side: OrderSide,
    pub reduce_only: bool,
    /// Exchange-native status string; translated by the caller.
    pub status: String,
    pub price: Price,
    /// Requested quantity.
    pub qty: Size,
    pub cum_exec_qty: Size,
    pub cum_exec_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    pub last_price: Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub size: Size,
}

/// Order book depth. Bids best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// One side of a hedge-mode position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionLeg {
    /// `Buy` for the long leg, `Sell` for the short leg.
    pub side: OrderSide,
    pub size: Size,
    pub entry_price: Price,
}

impl PositionLeg {
    pub fn flat(side: OrderSide) -> Self {
        Self {
            side,
            size: Size::ZERO,
            entry_price: Price::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    pub long: PositionLeg,
    pub short: PositionLeg,
}

impl PositionSnapshot {
    pub fn flat(symbol: Symbol) -> Self {
        Self {
            symbol,
            long: PositionLeg::flat(OrderSide::Buy),
            short: PositionLeg::flat(OrderSide::Sell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpx_core::PositionEffect;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_order_flags_follow_effect() {
        let request = OrderRequest::limit(
            Symbol::new("BTCUSDT").unwrap(),
            OrderSide::Buy,
            PositionEffect::Close,
            Price::new(dec!(100)),
            Size::new(dec!(1)),
        );

        let order = NewOrder::from_request(&request);
        assert!(order.reduce_only);
        assert!(order.close_on_trigger);
        assert_eq!(order.time_in_force, TimeInForce::GoodTillCancel);

        let again = NewOrder::from_request(&request);
        assert_ne!(order.client_order_id, again.client_order_id);
    }
}
