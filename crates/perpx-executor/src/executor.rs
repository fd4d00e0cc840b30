//! Order executor.
//!
//! One call to [`OrderExecutor::execute`] drives one order intention. Each
//! iteration of the chain loop submits an instance, reads a single status
//! snapshot and applies the [`RetryPolicy`]. A confirmed cancel of a resting
//! instance leads to a reissue of the unfilled size at a price derived from
//! the latest ticker; every other branch stops the chain.
//!
//! Fault handling:
//! - Submission failure is fatal (`SubmissionRejected`).
//! - An unknown raw status is fatal (`UnrecognizedState`).
//! - A failed first status query is fatal, since no snapshot exists yet.
//! - Either failure on a reissued instance ends the chain with
//!   `ReissueFailed` instead, so earlier fills are still reported.
//! - Every later gateway failure falls back to the last known record.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use perpx_core::{
    translate, OrderRecord, OrderRequest, OrderSide, PositionEffect, Price,
};
use perpx_gateway::{DynGateway, NewOrder, OrderSnapshot};
use perpx_telemetry::Metrics;

use crate::cancel::CancelOutcome;
use crate::error::{ExecutorError, ExecutorResult};
use crate::lock::SymbolLocks;
use crate::outcome::{cumulative_filled, OrderOutcome, StopReason};
use crate::policy::{ExecutorConfig, ReissueTrigger, RetryPolicy};

/// How one order instance ended.
#[derive(Debug)]
enum LinkEnd {
    Stop {
        record: OrderRecord,
        reason: StopReason,
    },
    /// Confirmed cancel; the unfilled size should be reissued.
    Reissue {
        record: OrderRecord,
        /// Ticker price that triggered the cancel, if any.
        trigger_price: Option<Price>,
        trigger: ReissueTrigger,
    },
}

impl LinkEnd {
    fn stop(record: OrderRecord, reason: StopReason) -> Self {
        Self::Stop { record, reason }
    }
}

/// Drives order intentions through submit, observe, cancel and reissue.
pub struct OrderExecutor {
    gateway: DynGateway,
    config: ExecutorConfig,
    locks: Arc<SymbolLocks>,
    cancel_token: CancellationToken,
}

impl OrderExecutor {
    pub fn new(gateway: DynGateway, config: ExecutorConfig) -> Self {
        Self {
            gateway,
            config,
            locks: Arc::new(SymbolLocks::new()),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Share a lock table with other executors on the same account.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<SymbolLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Use a caller-owned token to abort running executions.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn gateway(&self) -> &DynGateway {
        &self.gateway
    }

    pub fn locks(&self) -> &Arc<SymbolLocks> {
        &self.locks
    }

    /// Drive `request` to a final disposition under `policy`.
    pub async fn execute(
        &self,
        request: &OrderRequest,
        policy: &RetryPolicy,
    ) -> ExecutorResult<OrderOutcome> {
        request.validate()?;
        policy.validate()?;

        if self.config.backtest {
            debug!(
                symbol = %request.symbol,
                side = %request.side,
                effect = %request.effect,
                "Backtest mode, simulating fill"
            );
            let outcome = OrderOutcome::simulated(request);
            record_outcome(request, &outcome);
            return Ok(outcome);
        }

        let _guard = self.locks.acquire(&request.symbol).await;

        let mut links: Vec<OrderRecord> = Vec::new();
        let mut current = request.clone();

        loop {
            if self.cancel_token.is_cancelled() {
                let Some(last) = links.pop() else {
                    info!(symbol = %request.symbol, "Execution aborted before submission");
                    return Err(ExecutorError::Aborted);
                };
                return Ok(self.finish(request, links, last, StopReason::Aborted));
            }

            let record = match self.submit(&current).await {
                Ok(record) => record,
                Err(err) => {
                    let Some(last) = self.salvage(&current, &mut links, &err) else {
                        return Err(err);
                    };
                    return Ok(self.finish(request, links, last, StopReason::ReissueFailed));
                }
            };
            let (record, trigger_price, trigger) = match self.drive(&current, record, policy).await? {
                LinkEnd::Stop { record, reason } => {
                    return Ok(self.finish(request, links, record, reason));
                }
                LinkEnd::Reissue {
                    record,
                    trigger_price,
                    trigger,
                } => (record, trigger_price, trigger),
            };

            let remaining = request
                .size
                .saturating_sub(cumulative_filled(&links) + record.filled_size);
            if remaining.is_zero() {
                return Ok(self.finish(request, links, record, StopReason::Terminal));
            }

            let reissues = links.len() as u32 + 1;
            if reissues > self.config.max_reissues {
                warn!(
                    symbol = %request.symbol,
                    max_reissues = self.config.max_reissues,
                    remaining = %remaining,
                    "Reissue limit reached, abandoning remainder"
                );
                return Ok(self.finish(request, links, record, StopReason::ReissueLimitReached));
            }

            let delay = self.config.backoff_delay(reissues);
            if !self.wait(delay).await {
                return Ok(self.finish(request, links, record, StopReason::Aborted));
            }

            let price = self
                .reissue_price(&current, trigger_price, policy)
                .await;

            info!(
                symbol = %request.symbol,
                side = %request.side,
                effect = %request.effect,
                previous_order_id = %record.order_id,
                trigger = trigger.as_str(),
                price = %price,
                size = %remaining,
                depth = reissues + 1,
                "Reissuing order"
            );
            Metrics::reissue(request.symbol.as_str(), trigger.as_str());

            links.push(record);
            current = request.reissue(price, remaining);
        }
    }

    /// Apply the policy to one freshly submitted instance.
    async fn drive(
        &self,
        request: &OrderRequest,
        mut record: OrderRecord,
        policy: &RetryPolicy,
    ) -> ExecutorResult<LinkEnd> {
        if record.status.ends_instance() {
            return Ok(LinkEnd::stop(record, StopReason::Terminal));
        }
        if policy.is_passive() {
            return Ok(LinkEnd::stop(record, StopReason::Reported));
        }

        if policy.price_cancellation {
            if let Some(last) = self.price_trigger(&record, policy).await {
                info!(
                    symbol = %request.symbol,
                    order_id = %record.order_id,
                    side = %record.side,
                    price = %record.requested_price,
                    last = %last,
                    amplitude = %policy.amplitude,
                    "Price moved past amplitude, cancelling"
                );
                match self.cancel(request, &record).await? {
                    CancelOutcome::Confirmed(record) => {
                        return Ok(LinkEnd::Reissue {
                            record,
                            trigger_price: Some(last),
                            trigger: ReissueTrigger::Price,
                        });
                    }
                    CancelOutcome::AlreadyTerminal(record) => {
                        return Ok(LinkEnd::stop(record, StopReason::Terminal));
                    }
                    CancelOutcome::NotConfirmed(r) | CancelOutcome::TransientFailure(r) => {
                        record = r;
                    }
                }
            }
        }

        if policy.time_cancellation {
            debug!(
                symbol = %request.symbol,
                order_id = %record.order_id,
                delay_secs = policy.delay_secs,
                "Waiting before time cancellation"
            );
            if !self.wait(policy.delay()).await {
                return self.abort_resting(request, record).await;
            }

            record = self.refresh(request, record).await?;
            if record.status.ends_instance() {
                return Ok(LinkEnd::stop(record, StopReason::Terminal));
            }

            match self.cancel(request, &record).await? {
                CancelOutcome::Confirmed(record) => {
                    return Ok(LinkEnd::Reissue {
                        record,
                        trigger_price: None,
                        trigger: ReissueTrigger::Time,
                    });
                }
                CancelOutcome::AlreadyTerminal(record) => {
                    return Ok(LinkEnd::stop(record, StopReason::Terminal));
                }
                CancelOutcome::NotConfirmed(r) | CancelOutcome::TransientFailure(r) => {
                    record = r;
                }
            }
        }

        if policy.automatic_cancellation {
            let end = match self.cancel(request, &record).await? {
                CancelOutcome::AlreadyTerminal(record) => {
                    LinkEnd::stop(record, StopReason::Terminal)
                }
                other => LinkEnd::stop(other.into_record(), StopReason::AutoCancelled),
            };
            return Ok(end);
        }

        Ok(LinkEnd::stop(record, StopReason::PolicyNotTriggered))
    }

    /// Submit one instance and read its first snapshot.
    async fn submit(&self, request: &OrderRequest) -> ExecutorResult<OrderRecord> {
        let order = NewOrder::from_request(request);
        let symbol = request.symbol.as_str();
        Metrics::order_submitted(symbol, &request.side.to_string(), &request.effect.to_string());

        let ack = self.gateway.create_order(&order).await.map_err(|e| {
            Metrics::gateway_error("create_order", e.is_transient());
            ExecutorError::SubmissionRejected {
                symbol: symbol.to_string(),
                message: e.to_string(),
            }
        })?;

        let order_id = match (ack.accepted, ack.order_id) {
            (true, Some(order_id)) => order_id,
            _ => {
                Metrics::order_refused(symbol);
                warn!(
                    symbol,
                    side = %request.side,
                    effect = %request.effect,
                    message = %ack.message,
                    "Order submission refused"
                );
                return Err(ExecutorError::SubmissionRejected {
                    symbol: symbol.to_string(),
                    message: ack.message,
                });
            }
        };

        info!(
            symbol,
            order_id = %order_id,
            client_order_id = %order.client_order_id,
            action = %request.action(),
            price = %request.price,
            size = %request.size,
            "Order submitted"
        );

        let snapshot = self
            .gateway
            .get_order(&request.symbol, &order_id)
            .await
            .map_err(|source| {
                Metrics::gateway_error("get_order", source.is_transient());
                ExecutorError::Gateway {
                    operation: "get_order",
                    order_id: Some(order_id.clone()),
                    source,
                }
            })?;

        self.observe(request, &snapshot)
    }

    /// Record to end the chain with when a reissued instance failed to
    /// submit or to report its first state. `None` for the first instance,
    /// or for errors that must propagate.
    fn salvage(
        &self,
        request: &OrderRequest,
        links: &mut Vec<OrderRecord>,
        err: &ExecutorError,
    ) -> Option<OrderRecord> {
        if links.is_empty() {
            return None;
        }
        match err {
            ExecutorError::SubmissionRejected { message, .. } => {
                warn!(
                    symbol = %request.symbol,
                    size = %request.size,
                    message = %message,
                    "Reissue refused, keeping earlier fills"
                );
                links.pop()
            }
            ExecutorError::Gateway {
                order_id: Some(order_id),
                source,
                ..
            } => {
                warn!(
                    symbol = %request.symbol,
                    order_id = %order_id,
                    error = %source,
                    "Reissued order state unknown, reporting it as resting"
                );
                Some(OrderRecord::submitted(order_id.clone(), request))
            }
            _ => None,
        }
    }

    /// Translate a snapshot into a record for `request`'s instance.
    fn observe(&self, request: &OrderRequest, snapshot: &OrderSnapshot) -> ExecutorResult<OrderRecord> {
        let effect = PositionEffect::from_reduce_only(snapshot.reduce_only);
        let translation = translate(&snapshot.status, snapshot.side, effect)?;

        let record = OrderRecord::observed(
            snapshot.order_id.clone(),
            request.symbol.clone(),
            snapshot.side,
            effect,
            request.price,
            request.size,
            snapshot.cum_exec_qty,
            snapshot.cum_exec_value,
            translation,
        );

        debug!(
            symbol = %record.symbol,
            order_id = %record.order_id,
            status = %record.status,
            action = %record.action,
            filled = %record.filled_size,
            "Order observed"
        );
        Ok(record)
    }

    /// Re-read an instance. Falls back to `known` when the query fails.
    async fn refresh(
        &self,
        request: &OrderRequest,
        known: OrderRecord,
    ) -> ExecutorResult<OrderRecord> {
        match self.gateway.get_order(&request.symbol, &known.order_id).await {
            Ok(snapshot) => self.observe(request, &snapshot),
            Err(e) => {
                Metrics::gateway_error("get_order", e.is_transient());
                warn!(
                    symbol = %request.symbol,
                    order_id = %known.order_id,
                    error = %e,
                    "Status query failed, using last known state"
                );
                Ok(known)
            }
        }
    }

    /// Request a cancel, then classify by the order's state afterwards.
    ///
    /// The cancel response itself is only logged: a refused or failed cancel
    /// often means the order already filled, which the follow-up query shows.
    async fn cancel(
        &self,
        request: &OrderRequest,
        record: &OrderRecord,
    ) -> ExecutorResult<CancelOutcome> {
        let symbol = &request.symbol;

        match self.gateway.cancel_order(symbol, &record.order_id).await {
            Ok(ack) if ack.accepted => {
                debug!(symbol = %symbol, order_id = %record.order_id, "Cancel accepted");
            }
            Ok(ack) => {
                warn!(
                    symbol = %symbol,
                    order_id = %record.order_id,
                    message = %ack.message,
                    "Cancel refused"
                );
            }
            Err(e) => {
                Metrics::gateway_error("cancel_order", e.is_transient());
                warn!(
                    symbol = %symbol,
                    order_id = %record.order_id,
                    error = %e,
                    "Cancel request failed"
                );
            }
        }

        let outcome = match self.gateway.get_order(symbol, &record.order_id).await {
            Ok(snapshot) => CancelOutcome::classify(self.observe(request, &snapshot)?),
            Err(e) => {
                Metrics::gateway_error("get_order", e.is_transient());
                warn!(
                    symbol = %symbol,
                    order_id = %record.order_id,
                    error = %e,
                    "Post-cancel status query failed"
                );
                CancelOutcome::TransientFailure(record.clone())
            }
        };

        Metrics::cancel(symbol.as_str(), outcome.label());
        debug!(
            symbol = %symbol,
            order_id = %record.order_id,
            outcome = outcome.label(),
            status = %outcome.record().status,
            "Cancel classified"
        );
        Ok(outcome)
    }

    /// Cancel a resting instance after the token fired.
    async fn abort_resting(
        &self,
        request: &OrderRequest,
        record: OrderRecord,
    ) -> ExecutorResult<LinkEnd> {
        info!(
            symbol = %request.symbol,
            order_id = %record.order_id,
            "Execution aborted, cancelling resting order"
        );
        let end = match self.cancel(request, &record).await? {
            CancelOutcome::AlreadyTerminal(record) => LinkEnd::stop(record, StopReason::Terminal),
            other => LinkEnd::stop(other.into_record(), StopReason::Aborted),
        };
        Ok(end)
    }

    /// Last price if it moved past the amplitude against the resting order.
    async fn price_trigger(&self, record: &OrderRecord, policy: &RetryPolicy) -> Option<Price> {
        let last = match self.gateway.get_ticker(&record.symbol).await {
            Ok(ticker) => ticker.last_price,
            Err(e) => {
                Metrics::gateway_error("get_ticker", e.is_transient());
                warn!(
                    symbol = %record.symbol,
                    error = %e,
                    "Ticker unavailable, skipping price check"
                );
                return None;
            }
        };

        let price = record.requested_price;
        let triggered = match record.side {
            OrderSide::Buy => last >= price.scaled(policy.amplitude),
            OrderSide::Sell => last <= price.scaled(-policy.amplitude),
        };

        debug!(
            symbol = %record.symbol,
            order_id = %record.order_id,
            price = %price,
            last = %last,
            triggered,
            "Price check"
        );
        triggered.then_some(last)
    }

    /// Price for the next instance: latest ticker shifted by the offset in the
    /// side's direction.
    async fn reissue_price(
        &self,
        request: &OrderRequest,
        trigger_price: Option<Price>,
        policy: &RetryPolicy,
    ) -> Price {
        let last = match self.gateway.get_ticker(&request.symbol).await {
            Ok(ticker) => ticker.last_price,
            Err(e) => {
                Metrics::gateway_error("get_ticker", e.is_transient());
                let fallback = trigger_price.unwrap_or(request.price);
                warn!(
                    symbol = %request.symbol,
                    error = %e,
                    fallback = %fallback,
                    "Ticker unavailable for reissue, using fallback price"
                );
                fallback
            }
        };

        match request.side {
            OrderSide::Buy => last.scaled(policy.reissue_offset),
            OrderSide::Sell => last.scaled(-policy.reissue_offset),
        }
    }

    /// Sleep unless the token fires first. Returns false when aborted.
    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    fn finish(
        &self,
        request: &OrderRequest,
        links: Vec<OrderRecord>,
        last: OrderRecord,
        reason: StopReason,
    ) -> OrderOutcome {
        let outcome = OrderOutcome::from_chain(request, links, last, reason);
        info!(
            symbol = %request.symbol,
            order_id = %outcome.order_id,
            action = %request.action(),
            status = %outcome.final_status,
            stop_reason = outcome.stop_reason.as_str(),
            filled = %outcome.filled_size,
            remaining = %outcome.remaining_size,
            depth = outcome.chain_depth,
            "Execution finished"
        );
        record_outcome(request, &outcome);
        outcome
    }
}

fn record_outcome(request: &OrderRequest, outcome: &OrderOutcome) {
    Metrics::outcome(
        request.symbol.as_str(),
        outcome.final_status.as_str(),
        outcome.stop_reason.as_str(),
        outcome.chain_depth,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpx_core::{DomainStatus, Size, Symbol};
    use perpx_gateway::{CancelAck, GatewayError, MockGateway, OrderAck, PaperGateway};
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::new("BTCUSDT").unwrap()
    }

    fn request(side: OrderSide, price: rust_decimal::Decimal, size: rust_decimal::Decimal) -> OrderRequest {
        OrderRequest::limit(
            btc(),
            side,
            PositionEffect::Open,
            Price::new(price),
            Size::new(size),
        )
    }

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            ..Default::default()
        }
    }

    fn setup() -> (Arc<MockGateway>, OrderExecutor) {
        let mock = Arc::new(MockGateway::new());
        let executor = OrderExecutor::new(mock.clone(), fast_config());
        (mock, executor)
    }

    #[tokio::test]
    async fn test_immediate_fill_makes_no_cancel_or_retry() {
        let (mock, executor) = setup();
        mock.push_status("Filled", Size::new(dec!(10)));
        let policy = RetryPolicy::none()
            .with_price_cancellation(dec!(0.01))
            .with_automatic_cancellation();

        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(10)), &policy)
            .await
            .unwrap();

        assert_eq!(outcome.final_status, DomainStatus::Filled);
        assert_eq!(outcome.filled_size, Size::new(dec!(10)));
        assert_eq!(outcome.stop_reason, StopReason::Terminal);
        assert_eq!(outcome.chain_depth, 1);
        assert!(mock.cancelled_orders().is_empty());
        assert_eq!(mock.created_orders().len(), 1);
        assert_eq!(mock.ticker_queries(), 0);
    }

    #[tokio::test]
    async fn test_price_deviation_cancels_and_reissues_sell() {
        let (mock, executor) = setup();
        // submit -> New, post-cancel -> Cancelled, reissue -> Filled
        mock.push_status("New", Size::ZERO);
        mock.push_status("Cancelled", Size::ZERO);
        mock.push_status("Filled", Size::new(dec!(5)));
        mock.push_last_price(Price::new(dec!(98)));

        let policy = RetryPolicy::none()
            .with_price_cancellation(dec!(0.01))
            .with_reissue_offset(dec!(0.001));
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(5)), &policy)
            .await
            .unwrap();

        let created = mock.created_orders();
        assert_eq!(created.len(), 2);
        assert_eq!(mock.cancelled_orders(), vec!["mock-1".to_string()]);
        assert_eq!(created[1].price, Price::new(dec!(97.902)));
        assert_eq!(created[1].size, Size::new(dec!(5)));
        assert_eq!(created[1].side, OrderSide::Sell);

        assert!(outcome.is_filled());
        assert_eq!(outcome.chain_depth, 2);
        assert_eq!(outcome.order_id, "mock-2");
    }

    #[tokio::test]
    async fn test_price_within_amplitude_does_not_cancel() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);
        mock.push_last_price(Price::new(dec!(99.5)));

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(5)), &policy)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::PolicyNotTriggered);
        assert_eq!(outcome.final_status, DomainStatus::Waiting);
        assert!(mock.cancelled_orders().is_empty());
    }

    #[tokio::test]
    async fn test_buy_price_test_is_directional() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);
        // A falling price favours a resting buy; no cancel.
        mock.push_last_price(Price::new(dec!(90)));

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &policy)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::PolicyNotTriggered);
        assert!(mock.cancelled_orders().is_empty());
    }

    #[tokio::test]
    async fn test_automatic_cancellation_never_reissues() {
        let (mock, executor) = setup();
        mock.push_status("PartiallyFilled", Size::new(dec!(3)));
        mock.push_status("Cancelled", Size::new(dec!(3)));

        let policy = RetryPolicy::none().with_automatic_cancellation();
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(10)), &policy)
            .await
            .unwrap();

        assert_eq!(mock.cancelled_orders().len(), 1);
        assert_eq!(mock.created_orders().len(), 1);
        assert_eq!(outcome.final_status, DomainStatus::CancelledSuccessfully);
        assert_eq!(outcome.stop_reason, StopReason::AutoCancelled);
        assert_eq!(outcome.filled_size, Size::new(dec!(3)));
        assert_eq!(outcome.remaining_size, Size::new(dec!(7)));
    }

    #[tokio::test]
    async fn test_passive_policy_reports_first_snapshot() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);

        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(10)), &RetryPolicy::none())
            .await
            .unwrap();

        assert_eq!(outcome.final_status, DomainStatus::Waiting);
        assert_eq!(outcome.stop_reason, StopReason::Reported);
        assert_eq!(mock.created_orders().len(), 1);
        assert_eq!(mock.order_queries(), 1);
        assert_eq!(mock.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_backtest_makes_no_gateway_calls() {
        let mock = Arc::new(MockGateway::new());
        let config = ExecutorConfig {
            backtest: true,
            ..fast_config()
        };
        let executor = OrderExecutor::new(mock.clone(), config);
        let policy = RetryPolicy::none()
            .with_price_cancellation(dec!(0.01))
            .with_time_cancellation(30)
            .with_automatic_cancellation();

        for side in [OrderSide::Buy, OrderSide::Sell] {
            let outcome = executor
                .execute(&request(side, dec!(100), dec!(2)), &policy)
                .await
                .unwrap();
            assert_eq!(outcome.stop_reason, StopReason::Simulated);
            assert!(outcome.is_filled());
            assert_eq!(outcome.filled_value, dec!(200));
        }
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_reissue_sizes_are_monotonic() {
        let (mock, executor) = setup();
        // Link 1: 4 of 10 filled, then cancelled.
        mock.push_status("PartiallyFilled", Size::new(dec!(4)));
        mock.push_status("Cancelled", Size::new(dec!(4)));
        // Link 2: 2 of 6 filled, then cancelled.
        mock.push_status("PartiallyFilled", Size::new(dec!(2)));
        mock.push_status("Cancelled", Size::new(dec!(2)));
        // Link 3: fills the rest.
        mock.push_status("Filled", Size::new(dec!(4)));
        // Each link reads the ticker for its check and for the next price;
        // the market keeps rising past every reissued buy.
        for last in [dec!(110), dec!(110), dec!(120), dec!(120)] {
            mock.push_last_price(Price::new(last));
        }

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(10)), &policy)
            .await
            .unwrap();

        let created = mock.created_orders();
        let sizes: Vec<Size> = created.iter().map(|o| o.size).collect();
        assert_eq!(
            sizes,
            vec![Size::new(dec!(10)), Size::new(dec!(6)), Size::new(dec!(4))]
        );
        assert_eq!(created[1].price, Price::new(dec!(110)));
        assert_eq!(created[2].price, Price::new(dec!(120)));
        assert!(outcome.is_filled());
        assert_eq!(outcome.filled_size, Size::new(dec!(10)));
        assert_eq!(outcome.links.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_race_lost_returns_fill() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);
        mock.push_status("Filled", Size::new(dec!(5)));
        mock.push_cancel(Err(GatewayError::NotCancellable("mock-1".to_string())));
        mock.push_last_price(Price::new(dec!(98)));

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(5)), &policy)
            .await
            .unwrap();

        assert!(outcome.is_filled());
        assert_eq!(outcome.stop_reason, StopReason::Terminal);
        assert_eq!(mock.created_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_refused_cancel_falls_through_to_automatic() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);
        mock.push_cancel(Ok(CancelAck::refused("busy")));
        mock.push_last_price(Price::new(dec!(98)));

        let policy = RetryPolicy::none()
            .with_price_cancellation(dec!(0.01))
            .with_automatic_cancellation();
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(5)), &policy)
            .await
            .unwrap();

        // Status stays New: price cancel not confirmed, automatic cancel reports it.
        assert_eq!(mock.cancelled_orders().len(), 2);
        assert_eq!(outcome.stop_reason, StopReason::AutoCancelled);
        assert_eq!(outcome.final_status, DomainStatus::Waiting);
        assert_eq!(mock.created_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_reissue_cap() {
        let mock = Arc::new(MockGateway::new());
        let config = ExecutorConfig {
            max_reissues: 2,
            ..fast_config()
        };
        let executor = OrderExecutor::new(mock.clone(), config);
        // Every instance rests, every cancel confirms.
        for _ in 0..3 {
            mock.push_status("New", Size::ZERO);
            mock.push_status("Cancelled", Size::ZERO);
        }
        for last in [dec!(110), dec!(110), dec!(120), dec!(120), dec!(130)] {
            mock.push_last_price(Price::new(last));
        }

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &policy)
            .await
            .unwrap();

        assert_eq!(mock.created_orders().len(), 3);
        assert_eq!(mock.cancelled_orders().len(), 3);
        assert_eq!(outcome.stop_reason, StopReason::ReissueLimitReached);
        assert_eq!(outcome.final_status, DomainStatus::CancelledSuccessfully);
        assert_eq!(outcome.remaining_size, Size::new(dec!(1)));
    }

    #[tokio::test]
    async fn test_submission_refused() {
        let (mock, executor) = setup();
        mock.push_ack(Ok(OrderAck::refused("insufficient margin")));

        let err = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &RetryPolicy::none())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::SubmissionRejected { .. }));
        assert_eq!(mock.order_queries(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_state_surfaces() {
        let (mock, executor) = setup();
        mock.push_status("PendingCancel", Size::ZERO);

        let err = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &RetryPolicy::none())
            .await
            .unwrap_err();

        match err {
            ExecutorError::UnrecognizedState { raw, side, effect } => {
                assert_eq!(raw, "PendingCancel");
                assert_eq!(side, OrderSide::Buy);
                assert_eq!(effect, PositionEffect::Open);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_query_failure_is_gateway_error() {
        let (mock, executor) = setup();
        mock.push_status_error(GatewayError::Timeout);

        let err = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &RetryPolicy::none())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Gateway {
                operation,
                order_id,
                source,
            } => {
                assert_eq!(operation, "get_order");
                assert_eq!(order_id.as_deref(), Some("mock-1"));
                assert_eq!(source, GatewayError::Timeout);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refused_reissue_keeps_earlier_fills() {
        let (mock, executor) = setup();
        mock.push_ack(Ok(OrderAck::accepted("mock-1")));
        mock.push_ack(Ok(OrderAck::refused("order qty below minimum")));
        mock.push_status("PartiallyFilled", Size::new(dec!(4)));
        mock.push_status("Cancelled", Size::new(dec!(4)));
        mock.push_last_price(Price::new(dec!(110)));

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(10)), &policy)
            .await
            .unwrap();

        assert_eq!(mock.created_orders().len(), 2);
        assert_eq!(outcome.stop_reason, StopReason::ReissueFailed);
        assert_eq!(outcome.final_status, DomainStatus::CancelledSuccessfully);
        assert_eq!(outcome.order_id, "mock-1");
        assert_eq!(outcome.filled_size, Size::new(dec!(4)));
        assert_eq!(outcome.filled_value, dec!(400));
        assert_eq!(outcome.remaining_size, Size::new(dec!(6)));
        assert_eq!(outcome.chain_depth, 1);
    }

    #[tokio::test]
    async fn test_unreadable_reissue_is_reported_resting() {
        let (mock, executor) = setup();
        mock.push_status("PartiallyFilled", Size::new(dec!(4)));
        mock.push_status("Cancelled", Size::new(dec!(4)));
        mock.push_status_error(GatewayError::Timeout);
        mock.push_last_price(Price::new(dec!(110)));

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(10)), &policy)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::ReissueFailed);
        assert_eq!(outcome.order_id, "mock-2");
        assert_eq!(outcome.final_status, DomainStatus::Waiting);
        assert_eq!(outcome.chain_depth, 2);
        assert_eq!(outcome.filled_size, Size::new(dec!(4)));
        assert_eq!(outcome.remaining_size, Size::new(dec!(6)));
        assert_eq!(outcome.links[1].requested_size, Size::new(dec!(6)));
        assert_eq!(outcome.links[1].requested_price, Price::new(dec!(110)));
        assert!(mock.cancelled_orders().iter().all(|id| id == "mock-1"));
    }

    #[tokio::test]
    async fn test_failed_post_cancel_query_keeps_known_state() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);
        mock.push_status_error(GatewayError::Transport("connection reset".to_string()));
        mock.push_last_price(Price::new(dec!(98)));

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(5)), &policy)
            .await
            .unwrap();

        // Cancel outcome unknown: no reissue, the resting snapshot is reported.
        assert_eq!(mock.cancelled_orders(), vec!["mock-1".to_string()]);
        assert_eq!(mock.created_orders().len(), 1);
        assert_eq!(outcome.stop_reason, StopReason::PolicyNotTriggered);
        assert_eq!(outcome.final_status, DomainStatus::Waiting);
        assert_eq!(outcome.order_id, "mock-1");
        assert_eq!(outcome.remaining_size, Size::new(dec!(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_after_wait_uses_known_state() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO); // first snapshot
        mock.push_status_error(GatewayError::Timeout); // after the wait
        mock.push_status("Filled", Size::new(dec!(2))); // after cancel

        let policy = RetryPolicy::none().with_time_cancellation(30);
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(2)), &policy)
            .await
            .unwrap();

        // The stale Waiting record still drove the cancel; the fill won the race.
        assert_eq!(mock.order_queries(), 3);
        assert_eq!(mock.cancelled_orders(), vec!["mock-1".to_string()]);
        assert_eq!(mock.created_orders().len(), 1);
        assert!(outcome.is_filled());
        assert_eq!(outcome.stop_reason, StopReason::Terminal);
    }

    #[tokio::test]
    async fn test_ticker_failure_skips_price_check() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);
        mock.push_ticker_error(GatewayError::Timeout);

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(5)), &policy)
            .await
            .unwrap();

        assert_eq!(mock.ticker_queries(), 1);
        assert!(mock.cancelled_orders().is_empty());
        assert_eq!(outcome.stop_reason, StopReason::PolicyNotTriggered);
        assert_eq!(outcome.final_status, DomainStatus::Waiting);
    }

    #[tokio::test]
    async fn test_ticker_failure_at_reissue_uses_trigger_price() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO);
        mock.push_status("Cancelled", Size::ZERO);
        mock.push_status("Filled", Size::new(dec!(5)));
        mock.push_last_price(Price::new(dec!(98)));
        mock.push_ticker_error(GatewayError::Timeout);

        let policy = RetryPolicy::none()
            .with_price_cancellation(dec!(0.01))
            .with_reissue_offset(dec!(0.001));
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(5)), &policy)
            .await
            .unwrap();

        let created = mock.created_orders();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].price, Price::new(dec!(97.902)));
        assert_eq!(mock.ticker_queries(), 2);
        assert!(outcome.is_filled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reissue_price_is_read_after_backoff() {
        let symbol = btc();
        let paper = Arc::new(PaperGateway::new().with_market(symbol.clone(), Price::new(dec!(100))));
        let config = ExecutorConfig {
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(1),
            ..Default::default()
        };
        let executor = OrderExecutor::new(paper.clone(), config);

        // Rests below the market until the time cancel at 10s; the backoff
        // then runs until 11s.
        let policy = RetryPolicy::none().with_time_cancellation(10);
        let task = tokio::spawn(async move {
            executor
                .execute(&request(OrderSide::Buy, dec!(90), dec!(1)), &policy)
                .await
        });

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        paper.set_last_price(&symbol, Price::new(dec!(95)));

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.chain_depth, 2);
        assert_eq!(outcome.links[1].requested_price, Price::new(dec!(95)));
        assert!(outcome.is_filled());
    }

    #[tokio::test]
    async fn test_exchange_cancelled_snapshot_is_not_reissued() {
        let (mock, executor) = setup();
        mock.push_status("Cancelled", Size::ZERO);
        mock.push_last_price(Price::new(dec!(50)));

        let policy = RetryPolicy::none().with_price_cancellation(dec!(0.01));
        let outcome = executor
            .execute(&request(OrderSide::Sell, dec!(100), dec!(1)), &policy)
            .await
            .unwrap();

        assert_eq!(outcome.final_status, DomainStatus::CancelledSuccessfully);
        assert_eq!(outcome.stop_reason, StopReason::Terminal);
        assert_eq!(mock.created_orders().len(), 1);
        assert_eq!(mock.ticker_queries(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_gateway() {
        let (mock, executor) = setup();

        let err = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(0)), &RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidRequest(_)));
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_cancellation_waits_then_reissues() {
        let (mock, executor) = setup();
        mock.push_status("New", Size::ZERO); // first snapshot
        mock.push_status("New", Size::ZERO); // after the wait
        mock.push_status("Cancelled", Size::ZERO); // after cancel
        mock.push_status("Filled", Size::new(dec!(2))); // reissue
        mock.push_last_price(Price::new(dec!(101)));

        let policy = RetryPolicy::none()
            .with_time_cancellation(30)
            .with_reissue_offset(dec!(0.01));
        let start = tokio::time::Instant::now();
        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(2)), &policy)
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(outcome.is_filled());
        let created = mock.created_orders();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].price, Price::new(dec!(102.01)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_wait_cancels_resting_order() {
        let mock = Arc::new(MockGateway::new());
        let token = CancellationToken::new();
        let executor =
            OrderExecutor::new(mock.clone(), fast_config()).with_cancel_token(token.clone());
        mock.push_status("New", Size::ZERO);
        mock.push_status("Cancelled", Size::ZERO);

        let policy = RetryPolicy::none().with_time_cancellation(3600);
        let abort = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        });

        let outcome = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(2)), &policy)
            .await
            .unwrap();
        abort.await.unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Aborted);
        assert_eq!(outcome.remaining_size, Size::new(dec!(2)));
        assert_eq!(mock.cancelled_orders(), vec!["mock-1".to_string()]);
        assert_eq!(mock.created_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_abort_before_submission() {
        let (mock, executor) = setup();
        executor.cancel_token().cancel();

        let err = executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Aborted));
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_executions_on_one_symbol_are_serialized() {
        let mock = Arc::new(MockGateway::new());
        let locks = Arc::new(SymbolLocks::new());
        let executor =
            OrderExecutor::new(mock.clone(), fast_config()).with_locks(locks.clone());
        mock.push_status("Filled", Size::new(dec!(1)));

        let guard = locks.acquire(&btc()).await;
        let executor = Arc::new(executor);
        let task = {
            let executor = executor.clone();
            tokio::spawn(async move {
                executor
                    .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &RetryPolicy::none())
                    .await
            })
        };

        tokio::task::yield_now().await;
        assert!(mock.created_orders().is_empty());

        drop(guard);
        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.is_filled());
        tokio_test::assert_ok!(executor
            .execute(&request(OrderSide::Buy, dec!(100), dec!(1)), &RetryPolicy::none())
            .await);
    }
}
