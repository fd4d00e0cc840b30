//! Order-related types and identifiers.
//!
//! Provides order side, position effect, order type, time-in-force,
//! symbol and client order ID types, plus the [`OrderRequest`] that
//! describes one logical order intention.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Price, Size};
use crate::error::{CoreError, CoreResult};
use crate::status::ActionLabel;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Whether an order increases or reduces exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionEffect {
    /// Increases exposure.
    Open,
    /// Reduce-only, close-on-trigger.
    Close,
}

impl PositionEffect {
    /// Derive the effect from the exchange's reduce-only flag.
    pub fn from_reduce_only(reduce_only: bool) -> Self {
        if reduce_only {
            Self::Close
        } else {
            Self::Open
        }
    }

    pub fn reduce_only(&self) -> bool {
        matches!(self, Self::Close)
    }

    pub fn close_on_trigger(&self) -> bool {
        matches!(self, Self::Close)
    }
}

impl fmt::Display for PositionEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderType {
    /// Limit order.
    #[default]
    Limit,
    /// Market order.
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "Limit"),
            Self::Market => write!(f, "Market"),
        }
    }
}

/// Time-in-force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Rests on the book until filled or cancelled.
    #[default]
    GoodTillCancel,
    /// Fill what is possible immediately, cancel the rest.
    ImmediateOrCancel,
    /// Fill completely and immediately or cancel.
    FillOrKill,
    /// Rejected if it would take liquidity.
    PostOnly,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoodTillCancel => write!(f, "GoodTillCancel"),
            Self::ImmediateOrCancel => write!(f, "ImmediateOrCancel"),
            Self::FillOrKill => write!(f, "FillOrKill"),
            Self::PostOnly => write!(f, "PostOnly"),
        }
    }
}

/// Exchange symbol, e.g. `BTCUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from its exchange spelling.
    pub fn new(symbol: impl Into<String>) -> CoreResult<Self> {
        let symbol = symbol.into();
        let trimmed = symbol.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidSymbol("empty symbol".to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Normalise an instrument id of the form `BASE-QUOTE` (e.g. `BTC-USDT`).
    pub fn from_instrument_id(instrument_id: &str) -> CoreResult<Self> {
        let mut parts = instrument_id.split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                Self::new(format!("{base}{quote}"))
            }
            _ => Err(CoreError::InvalidSymbol(format!(
                "expected BASE-QUOTE, got {instrument_id:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Client order ID attached to every submission.
///
/// Each reissued instance gets a fresh one so the exchange never
/// deduplicates a reissue against its cancelled predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `perpx_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("perpx_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logical order intention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub effect: PositionEffect,
    /// Limit price.
    pub price: Price,
    pub size: Size,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Limit, good-till-cancel request.
    pub fn limit(
        symbol: Symbol,
        side: OrderSide,
        effect: PositionEffect,
        price: Price,
        size: Size,
    ) -> Self {
        Self {
            symbol,
            side,
            effect,
            price,
            size,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::GoodTillCancel,
        }
    }

    #[must_use]
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    #[must_use]
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Same intention at a new price and size; order type and TIF are kept.
    #[must_use]
    pub fn reissue(&self, price: Price, size: Size) -> Self {
        Self {
            price,
            size,
            ..self.clone()
        }
    }

    pub fn action(&self) -> ActionLabel {
        ActionLabel::of(self.side, self.effect)
    }

    /// Reject requests no exchange would accept.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.size.is_positive() {
            return Err(CoreError::InvalidSize(format!(
                "size must be positive, got {}",
                self.size
            )));
        }
        if self.order_type == OrderType::Limit && !self.price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "limit price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }
}
