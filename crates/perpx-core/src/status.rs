//! Order status translation.
//!
//! Maps the exchange-native order state, together with the order's side
//! and position effect, onto the domain status the executor branches on.
//!
//! | Raw               | Domain                  |
//! |-------------------|-------------------------|
//! | `New` / `Created` | `Waiting`               |
//! | `PartiallyFilled` | `PartialFill`           |
//! | `Filled`          | `Filled`                |
//! | `Cancelled`       | `CancelledSuccessfully` |
//! | `Rejected`        | `Failed`                |
//!
//! Anything else is an [`CoreError::UnrecognizedState`]. There is no
//! fallback status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Price, Size};
use crate::error::{CoreError, CoreResult};
use crate::order::{OrderRequest, OrderSide, PositionEffect, Symbol};

/// Exchange-native order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawOrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl RawOrderStatus {
    /// Parse the exchange spelling. `Created` is the pre-acceptance alias of `New`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "New" | "Created" => Some(Self::New),
            "PartiallyFilled" => Some(Self::PartiallyFilled),
            "Filled" => Some(Self::Filled),
            "Cancelled" => Some(Self::Cancelled),
            "Rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::PartiallyFilled => "PartiallyFilled",
            Self::Filled => "Filled",
            Self::Cancelled => "Cancelled",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for RawOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain status of one order instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Waiting,
    PartialFill,
    Filled,
    CancelledSuccessfully,
    Failed,
}

impl DomainStatus {
    /// The order instance can no longer change (it may still be reissued).
    pub fn ends_instance(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Failed | Self::CancelledSuccessfully
        )
    }

    /// Stable snake_case name, matching the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::PartialFill => "partial_fill",
            Self::Filled => "filled",
            Self::CancelledSuccessfully => "cancelled_successfully",
            Self::Failed => "failed",
        }
    }

    /// Human-readable label; presentation only.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting for fill",
            Self::PartialFill => "partially filled",
            Self::Filled => "completely filled",
            Self::CancelledSuccessfully => "cancelled successfully",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What an order does to the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionLabel {
    OpenLong,
    CloseLong,
    CloseShort,
    OpenShort,
}

impl ActionLabel {
    pub fn of(side: OrderSide, effect: PositionEffect) -> Self {
        match (side, effect) {
            (OrderSide::Buy, PositionEffect::Open) => Self::OpenLong,
            (OrderSide::Sell, PositionEffect::Close) => Self::CloseLong,
            (OrderSide::Buy, PositionEffect::Close) => Self::CloseShort,
            (OrderSide::Sell, PositionEffect::Open) => Self::OpenShort,
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenLong => write!(f, "open-long"),
            Self::CloseLong => write!(f, "close-long"),
            Self::CloseShort => write!(f, "close-short"),
            Self::OpenShort => write!(f, "open-short"),
        }
    }
}

/// Result of translating one raw status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub raw: RawOrderStatus,
    pub status: DomainStatus,
    pub action: ActionLabel,
}

/// Translate a raw exchange status for an order with the given side and effect.
pub fn translate(raw: &str, side: OrderSide, effect: PositionEffect) -> CoreResult<Translation> {
    let parsed = RawOrderStatus::parse(raw).ok_or_else(|| CoreError::UnrecognizedState {
        raw: raw.to_string(),
        side,
        effect,
    })?;

    let status = match parsed {
        RawOrderStatus::New => DomainStatus::Waiting,
        RawOrderStatus::PartiallyFilled => DomainStatus::PartialFill,
        RawOrderStatus::Filled => DomainStatus::Filled,
        RawOrderStatus::Cancelled => DomainStatus::CancelledSuccessfully,
        RawOrderStatus::Rejected => DomainStatus::Failed,
    };

    Ok(Translation {
        raw: parsed,
        status,
        action: ActionLabel::of(side, effect),
    })
}

/// Observed state of one order instance.
///
/// A reissue always produces a new record with a new `order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub effect: PositionEffect,
    pub requested_price: Price,
    pub requested_size: Size,
    /// Always within `[0, requested_size]`.
    pub filled_size: Size,
    pub filled_value: Decimal,
    pub status: DomainStatus,
    pub action: ActionLabel,
    pub observed_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Build a record from a translated observation. Fills are clamped to the request.
    #[allow(clippy::too_many_arguments)]
    pub fn observed(
        order_id: impl Into<String>,
        symbol: Symbol,
        side: OrderSide,
        effect: PositionEffect,
        requested_price: Price,
        requested_size: Size,
        filled_size: Size,
        filled_value: Decimal,
        translation: Translation,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            symbol,
            side,
            effect,
            requested_price,
            requested_size,
            filled_size: filled_size.clamp_to(requested_size),
            filled_value: filled_value.max(Decimal::ZERO),
            status: translation.status,
            action: translation.action,
            observed_at: Utc::now(),
        }
    }

    /// Accepted instance whose state could not be read yet.
    pub fn submitted(order_id: impl Into<String>, request: &OrderRequest) -> Self {
        Self {
            order_id: order_id.into(),
            symbol: request.symbol.clone(),
            side: request.side,
            effect: request.effect,
            requested_price: request.price,
            requested_size: request.size,
            filled_size: Size::ZERO,
            filled_value: Decimal::ZERO,
            status: DomainStatus::Waiting,
            action: request.action(),
            observed_at: Utc::now(),
        }
    }

    /// Unfilled part of this instance.
    pub fn remaining(&self) -> Size {
        self.requested_size.saturating_sub(self.filled_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SIDES: [OrderSide; 2] = [OrderSide::Buy, OrderSide::Sell];
    const EFFECTS: [PositionEffect; 2] = [PositionEffect::Open, PositionEffect::Close];

    #[test]
    fn test_translate_covers_every_known_combination() {
        let table = [
            ("New", DomainStatus::Waiting),
            ("Created", DomainStatus::Waiting),
            ("PartiallyFilled", DomainStatus::PartialFill),
            ("Filled", DomainStatus::Filled),
            ("Cancelled", DomainStatus::CancelledSuccessfully),
            ("Rejected", DomainStatus::Failed),
        ];

        for side in SIDES {
            for effect in EFFECTS {
                for (raw, expected) in table {
                    let t = translate(raw, side, effect).unwrap();
                    assert_eq!(t.status, expected, "{raw} {side} {effect}");
                    assert_eq!(t.action, ActionLabel::of(side, effect));
                }
            }
        }
    }

    #[test]
    fn test_translate_tolerates_padding() {
        let t = translate("Created ", OrderSide::Buy, PositionEffect::Open).unwrap();
        assert_eq!(t.raw, RawOrderStatus::New);
        assert_eq!(t.status, DomainStatus::Waiting);
    }

    #[test]
    fn test_translate_rejects_unknown_state() {
        let err = translate("PendingCancel", OrderSide::Sell, PositionEffect::Close).unwrap_err();
        match err {
            CoreError::UnrecognizedState { raw, side, effect } => {
                assert_eq!(raw, "PendingCancel");
                assert_eq!(side, OrderSide::Sell);
                assert_eq!(effect, PositionEffect::Close);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(translate("", OrderSide::Buy, PositionEffect::Open).is_err());
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(
            ActionLabel::of(OrderSide::Buy, PositionEffect::Open).to_string(),
            "open-long"
        );
        assert_eq!(
            ActionLabel::of(OrderSide::Sell, PositionEffect::Close).to_string(),
            "close-long"
        );
        assert_eq!(
            ActionLabel::of(OrderSide::Buy, PositionEffect::Close).to_string(),
            "close-short"
        );
        assert_eq!(
            ActionLabel::of(OrderSide::Sell, PositionEffect::Open).to_string(),
            "open-short"
        );
        assert_eq!(
            serde_json::to_string(&ActionLabel::CloseShort).unwrap(),
            "\"close-short\""
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(DomainStatus::Filled.ends_instance());
        assert!(DomainStatus::Failed.ends_instance());
        assert!(DomainStatus::CancelledSuccessfully.ends_instance());
        assert!(!DomainStatus::Waiting.ends_instance());
        assert!(!DomainStatus::PartialFill.ends_instance());
    }

    #[test]
    fn test_record_clamps_fills() {
        let t = translate("Filled", OrderSide::Buy, PositionEffect::Open).unwrap();
        let record = OrderRecord::observed(
            "1",
            Symbol::new("BTCUSDT").unwrap(),
            OrderSide::Buy,
            PositionEffect::Open,
            Price::new(dec!(100)),
            Size::new(dec!(10)),
            Size::new(dec!(11)),
            dec!(1100),
            t,
        );

        assert_eq!(record.filled_size, Size::new(dec!(10)));
        assert_eq!(record.remaining(), Size::ZERO);
        assert_eq!(record.action, ActionLabel::OpenLong);
    }

    #[test]
    fn test_submitted_record_is_waiting_with_no_fills() {
        let request = OrderRequest::limit(
            Symbol::new("BTCUSDT").unwrap(),
            OrderSide::Sell,
            PositionEffect::Close,
            Price::new(dec!(101)),
            Size::new(dec!(3)),
        );
        let record = OrderRecord::submitted("42", &request);

        assert_eq!(record.order_id, "42");
        assert_eq!(record.status, DomainStatus::Waiting);
        assert_eq!(record.action, ActionLabel::CloseLong);
        assert!(record.filled_size.is_zero());
        assert_eq!(record.remaining(), Size::new(dec!(3)));
    }
}
