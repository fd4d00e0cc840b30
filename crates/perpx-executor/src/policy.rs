//! Retry policy and executor configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, ExecutorResult};

/// How a resting order is handled after submission.
///
/// Branches are evaluated in the fixed order price, time, automatic.
/// With every switch off the first snapshot is reported as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Cancel and reissue when the last price moves past `amplitude`.
    pub price_cancellation: bool,
    /// Fractional deviation, e.g. 0.01 = 1%.
    pub amplitude: Decimal,
    /// Wait `delay_secs`, then cancel and reissue whatever is still resting.
    pub time_cancellation: bool,
    pub delay_secs: u64,
    /// Cancel immediately and report. Never reissues.
    pub automatic_cancellation: bool,
    /// Reissue price = last * (1 +/- offset), sign by side.
    pub reissue_offset: Decimal,
}

impl RetryPolicy {
    /// Fire-and-report: submit, query once, return.
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_price_cancellation(mut self, amplitude: Decimal) -> Self {
        self.price_cancellation = true;
        self.amplitude = amplitude;
        self
    }

    #[must_use]
    pub fn with_time_cancellation(mut self, delay_secs: u64) -> Self {
        self.time_cancellation = true;
        self.delay_secs = delay_secs;
        self
    }

    #[must_use]
    pub fn with_automatic_cancellation(mut self) -> Self {
        self.automatic_cancellation = true;
        self
    }

    #[must_use]
    pub fn with_reissue_offset(mut self, offset: Decimal) -> Self {
        self.reissue_offset = offset;
        self
    }

    /// No cancellation branch is enabled.
    pub fn is_passive(&self) -> bool {
        !(self.price_cancellation || self.time_cancellation || self.automatic_cancellation)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn validate(&self) -> ExecutorResult<()> {
        if self.amplitude.is_sign_negative() {
            return Err(ExecutorError::InvalidRequest(format!(
                "amplitude must not be negative, got {}",
                self.amplitude
            )));
        }
        if self.reissue_offset.is_sign_negative() || self.reissue_offset >= Decimal::ONE {
            return Err(ExecutorError::InvalidRequest(format!(
                "reissue offset must be in [0, 1), got {}",
                self.reissue_offset
            )));
        }
        Ok(())
    }
}

/// What caused a reissue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReissueTrigger {
    Price,
    Time,
}

impl ReissueTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Time => "time",
        }
    }
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Simulate every execution without touching the gateway.
    pub backtest: bool,
    /// Maximum reissues per execution (links after the first).
    pub max_reissues: u32,
    /// Backoff before the first reissue; doubles per reissue.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            backtest: false,
            max_reissues: 10,
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(5),
        }
    }
}

impl ExecutorConfig {
    /// Backoff before reissue number `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}
