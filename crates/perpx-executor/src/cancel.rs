//! Classified result of a cancel attempt.

use perpx_core::{DomainStatus, OrderRecord};

/// What a cancel attempt achieved, judged by the order's state afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order is now cancelled. Unfilled size may be reissued.
    Confirmed(OrderRecord),
    /// The order reached Filled or Failed before the cancel landed.
    AlreadyTerminal(OrderRecord),
    /// The order is still resting.
    NotConfirmed(OrderRecord),
    /// No fresh snapshot could be read; carries the last known record.
    TransientFailure(OrderRecord),
}

impl CancelOutcome {
    /// Classify a snapshot read after the cancel request.
    pub fn classify(record: OrderRecord) -> Self {
        match record.status {
            DomainStatus::CancelledSuccessfully => Self::Confirmed(record),
            DomainStatus::Filled | DomainStatus::Failed => Self::AlreadyTerminal(record),
            DomainStatus::Waiting | DomainStatus::PartialFill => Self::NotConfirmed(record),
        }
    }

    pub fn record(&self) -> &OrderRecord {
        match self {
            Self::Confirmed(r)
            | Self::AlreadyTerminal(r)
            | Self::NotConfirmed(r)
            | Self::TransientFailure(r) => r,
        }
    }

    pub fn into_record(self) -> OrderRecord {
        match self {
            Self::Confirmed(r)
            | Self::AlreadyTerminal(r)
            | Self::NotConfirmed(r)
            | Self::TransientFailure(r) => r,
        }
    }

    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed(_) => "confirmed",
            Self::AlreadyTerminal(_) => "already_terminal",
            Self::NotConfirmed(_) => "not_confirmed",
            Self::TransientFailure(_) => "transient_failure",
        }
    }
}
