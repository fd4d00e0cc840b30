//! Prometheus metrics for perpx.
//!
//! Covers:
//! - Order submissions
//! - Cancel outcomes
//! - Reissues by trigger
//! - Final execution outcomes and reissue chain depth
//! - Position reversals
//! - Gateway errors
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error that should crash at
//! first use. Registration only happens during lazy static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec,
    TextEncoder,
};

use crate::error::TelemetryResult;

/// Orders submitted to the gateway (every link of a reissue chain counts).
pub static ORDERS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpx_orders_submitted_total",
        "Total orders submitted",
        &["symbol", "side", "effect"]
    )
    .unwrap()
});

/// Orders the exchange refused at submission.
pub static ORDERS_REFUSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpx_orders_refused_total",
        "Total order submissions refused by the exchange",
        &["symbol"]
    )
    .unwrap()
});

/// Cancel attempts by classified outcome.
/// Labels: outcome (confirmed/already_terminal/not_confirmed/transient_failure)
pub static CANCELS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpx_cancels_total",
        "Total cancel attempts by outcome",
        &["symbol", "outcome"]
    )
    .unwrap()
});

/// Reissues by trigger (price/time).
pub static REISSUES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpx_reissues_total",
        "Total order reissues",
        &["symbol", "trigger"]
    )
    .unwrap()
});

/// Final outcomes of `execute`.
pub static OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpx_outcomes_total",
        "Total execution outcomes",
        &["symbol", "status", "stop_reason"]
    )
    .unwrap()
});

/// Number of order instances per execution.
pub static CHAIN_DEPTH: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "perpx_chain_depth",
        "Order instances per execution",
        &["symbol"],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 15.0, 20.0]
    )
    .unwrap()
});

/// Position reversals.
/// Labels: result (completed/close_not_filled/simulated)
pub static REVERSALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpx_reversals_total",
        "Total position reversals",
        &["symbol", "result"]
    )
    .unwrap()
});

/// Gateway call failures.
pub static GATEWAY_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "perpx_gateway_errors_total",
        "Total gateway call failures",
        &["operation", "kind"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn order_submitted(symbol: &str, side: &str, effect: &str) {
        ORDERS_SUBMITTED_TOTAL
            .with_label_values(&[symbol, side, effect])
            .inc();
    }

    pub fn order_refused(symbol: &str) {
        ORDERS_REFUSED_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Record a classified cancel attempt.
    pub fn cancel(symbol: &str, outcome: &str) {
        CANCELS_TOTAL.with_label_values(&[symbol, outcome]).inc();
    }

    pub fn reissue(symbol: &str, trigger: &str) {
        REISSUES_TOTAL.with_label_values(&[symbol, trigger]).inc();
    }

    /// Record the final outcome of one execution and its chain depth.
    pub fn outcome(symbol: &str, status: &str, stop_reason: &str, chain_depth: usize) {
        OUTCOMES_TOTAL
            .with_label_values(&[symbol, status, stop_reason])
            .inc();
        CHAIN_DEPTH
            .with_label_values(&[symbol])
            .observe(chain_depth as f64);
    }

    pub fn reversal(symbol: &str, result: &str) {
        REVERSALS_TOTAL.with_label_values(&[symbol, result]).inc();
    }

    /// Record a failed gateway call; `transient` separates network faults
    /// from errors about the order itself.
    pub fn gateway_error(operation: &str, transient: bool) {
        let kind = if transient { "transient" } else { "permanent" };
        GATEWAY_ERRORS_TOTAL
            .with_label_values(&[operation, kind])
            .inc();
    }

    /// Encode the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = CANCELS_TOTAL
            .with_label_values(&["TESTUSDT", "confirmed"])
            .get();
        Metrics::cancel("TESTUSDT", "confirmed");
        let after = CANCELS_TOTAL
            .with_label_values(&["TESTUSDT", "confirmed"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_render_contains_recorded_series() {
        Metrics::outcome("RENDERUSDT", "filled", "terminal", 2);
        let text = Metrics::render().unwrap();
        assert!(text.contains("perpx_outcomes_total"));
        assert!(text.contains("RENDERUSDT"));
        assert!(text.contains("perpx_chain_depth_bucket"));
    }

    #[test]
    fn test_gateway_errors_split_by_kind() {
        let read = |kind: &str| {
            GATEWAY_ERRORS_TOTAL
                .with_label_values(&["kind_test_op", kind])
                .get()
        };
        let (transient, permanent) = (read("transient"), read("permanent"));
        Metrics::gateway_error("kind_test_op", true);
        Metrics::gateway_error("kind_test_op", false);
        Metrics::gateway_error("kind_test_op", false);
        assert_eq!(read("transient") - transient, 1.0);
        assert_eq!(read("permanent") - permanent, 2.0);
    }
}
