//! Position reversal.
//!
//! A reversal closes the current exposure and then opens the opposite one.
//! Both legs trade on the same book side: covering a short and opening a long
//! are both buys. The open leg runs only when the close leg reports
//! `Filled`; anything else returns the close outcome alone, so no new
//! exposure is ever opened on top of an unverified close.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use perpx_core::{OrderRequest, OrderSide, PositionEffect, Price, Size, Symbol};
use perpx_executor::{OrderExecutor, OrderOutcome, RetryPolicy};
use perpx_telemetry::Metrics;

use crate::error::{PositionError, PositionResult};

/// Price and size of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub price: Price,
    pub size: Size,
}

impl Leg {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalOutcome {
    pub close: OrderOutcome,
    /// `None` when the close leg did not fill completely.
    pub open: Option<OrderOutcome>,
}

impl ReversalOutcome {
    /// Both legs ran and both filled.
    pub fn is_complete(&self) -> bool {
        self.close.is_filled() && self.open.as_ref().is_some_and(OrderOutcome::is_filled)
    }
}

/// Runs close-then-open reversals through one executor.
pub struct ReversalOrchestrator {
    executor: Arc<OrderExecutor>,
}

impl ReversalOrchestrator {
    pub fn new(executor: Arc<OrderExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<OrderExecutor> {
        &self.executor
    }

    /// Close with `close`, then open with `open` if and only if the close filled.
    pub async fn reverse(
        &self,
        close: &OrderRequest,
        open: &OrderRequest,
        policy: &RetryPolicy,
    ) -> PositionResult<ReversalOutcome> {
        validate_legs(close, open)?;
        let symbol = close.symbol.as_str();

        if self.executor.config().backtest {
            info!(symbol, side = %close.side, "Backtest mode, simulating reversal");
            Metrics::reversal(symbol, "simulated");
            return Ok(ReversalOutcome {
                close: OrderOutcome::simulated(close),
                open: Some(OrderOutcome::simulated(open)),
            });
        }

        let close_outcome = self.executor.execute(close, policy).await?;
        if !close_outcome.is_filled() {
            warn!(
                symbol,
                close_action = %close.action(),
                status = %close_outcome.final_status,
                filled = %close_outcome.filled_size,
                remaining = %close_outcome.remaining_size,
                "Close leg not filled, skipping open leg"
            );
            Metrics::reversal(symbol, "close_not_filled");
            return Ok(ReversalOutcome {
                close: close_outcome,
                open: None,
            });
        }

        info!(
            symbol,
            close_order_id = %close_outcome.order_id,
            open_action = %open.action(),
            "Close leg filled, opening"
        );
        let open_outcome = self.executor.execute(open, policy).await?;
        Metrics::reversal(symbol, "completed");

        Ok(ReversalOutcome {
            close: close_outcome,
            open: Some(open_outcome),
        })
    }

    /// Cover a short, then open a long.
    pub async fn reverse_to_long(
        &self,
        symbol: &Symbol,
        cover: Leg,
        open: Leg,
        policy: &RetryPolicy,
    ) -> PositionResult<ReversalOutcome> {
        let (close, open) = legs(symbol, OrderSide::Buy, cover, open);
        self.reverse(&close, &open, policy).await
    }

    /// Sell a long, then open a short.
    pub async fn reverse_to_short(
        &self,
        symbol: &Symbol,
        cover: Leg,
        open: Leg,
        policy: &RetryPolicy,
    ) -> PositionResult<ReversalOutcome> {
        let (close, open) = legs(symbol, OrderSide::Sell, cover, open);
        self.reverse(&close, &open, policy).await
    }
}

fn legs(symbol: &Symbol, side: OrderSide, close: Leg, open: Leg) -> (OrderRequest, OrderRequest) {
    (
        OrderRequest::limit(
            symbol.clone(),
            side,
            PositionEffect::Close,
            close.price,
            close.size,
        ),
        OrderRequest::limit(symbol.clone(), side, PositionEffect::Open, open.price, open.size),
    )
}

fn validate_legs(close: &OrderRequest, open: &OrderRequest) -> PositionResult<()> {
    if close.effect != PositionEffect::Close {
        return Err(PositionError::InvalidLegs(format!(
            "close leg must reduce exposure, got {}",
            close.action()
        )));
    }
    if open.effect != PositionEffect::Open {
        return Err(PositionError::InvalidLegs(format!(
            "open leg must add exposure, got {}",
            open.action()
        )));
    }
    if close.symbol != open.symbol {
        return Err(PositionError::InvalidLegs(format!(
            "legs trade different symbols: {} and {}",
            close.symbol, open.symbol
        )));
    }
    if close.side != open.side {
        return Err(PositionError::InvalidLegs(format!(
            "{} cannot be followed by {}",
            close.action(),
            open.action()
        )));
    }
    Ok(())
}
