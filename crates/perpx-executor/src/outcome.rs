//! Result of one execution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use perpx_core::{DomainStatus, OrderRecord, OrderRequest, Size};

/// Order id reported by simulated executions.
pub const BACKTEST_ORDER_ID: &str = "backtest";

/// Why the executor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last instance ended on its own (filled, failed or cancelled by the exchange),
    /// or the whole size was filled.
    Terminal,
    /// No policy enabled; the first snapshot is reported as-is.
    Reported,
    /// Policies were enabled but none fired.
    PolicyNotTriggered,
    /// Automatic cancellation took the order off the book.
    AutoCancelled,
    /// The reissue cap was hit.
    ReissueLimitReached,
    /// A reissued instance was refused, or its first state could not be read.
    /// Earlier fills are kept and the remainder is reported unfilled.
    ReissueFailed,
    /// The caller's cancellation token fired.
    Aborted,
    /// Backtest mode.
    Simulated,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Reported => "reported",
            Self::PolicyNotTriggered => "policy_not_triggered",
            Self::AutoCancelled => "auto_cancelled",
            Self::ReissueLimitReached => "reissue_limit_reached",
            Self::ReissueFailed => "reissue_failed",
            Self::Aborted => "aborted",
            Self::Simulated => "simulated",
        }
    }
}

/// Final disposition of one order intention across its reissue chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub final_status: DomainStatus,
    /// ID of the last order instance.
    pub order_id: String,
    /// Cumulative over all instances.
    pub filled_size: Size,
    pub filled_value: Decimal,
    /// Number of order instances submitted.
    pub chain_depth: usize,
    /// Unfilled size left behind. Nonzero with a non-reissuing stop reason means
    /// the remainder was cancelled and abandoned, or is still resting.
    pub remaining_size: Size,
    pub stop_reason: StopReason,
    /// One record per instance, in submission order.
    pub links: Vec<OrderRecord>,
}

impl OrderOutcome {
    /// Fixed success outcome for backtest mode.
    pub fn simulated(request: &OrderRequest) -> Self {
        Self {
            final_status: DomainStatus::Filled,
            order_id: BACKTEST_ORDER_ID.to_string(),
            filled_size: request.size,
            filled_value: request.size.notional(request.price),
            chain_depth: 0,
            remaining_size: Size::ZERO,
            stop_reason: StopReason::Simulated,
            links: Vec::new(),
        }
    }

    /// Fold a chain into an outcome. `last` is the most recent instance.
    pub(crate) fn from_chain(
        original: &OrderRequest,
        mut links: Vec<OrderRecord>,
        last: OrderRecord,
        stop_reason: StopReason,
    ) -> Self {
        let filled_size = (cumulative_filled(&links) + last.filled_size).clamp_to(original.size);
        let filled_value = links
            .iter()
            .map(|r| r.filled_value)
            .fold(last.filled_value, |acc, v| acc + v);
        let remaining_size = original.size.saturating_sub(filled_size);

        // A chain that filled the whole request is filled, whatever the last
        // instance says.
        let final_status = if remaining_size.is_zero() {
            DomainStatus::Filled
        } else {
            last.status
        };

        let order_id = last.order_id.clone();
        links.push(last);

        Self {
            final_status,
            order_id,
            filled_size,
            filled_value,
            chain_depth: links.len(),
            remaining_size,
            stop_reason,
            links,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.final_status == DomainStatus::Filled
    }

    /// Average fill price, if anything filled.
    pub fn average_price(&self) -> Option<Decimal> {
        if self.filled_size.is_zero() {
            None
        } else {
            Some(self.filled_value / self.filled_size.inner())
        }
    }
}

/// Sum of fills over completed links.
pub(crate) fn cumulative_filled(links: &[OrderRecord]) -> Size {
    links.iter().fold(Size::ZERO, |acc, r| acc + r.filled_size)
}
