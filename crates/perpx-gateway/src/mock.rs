//! Scripted gateway for tests.
//!
//! Responses are queued per operation. When only one scripted response
//! remains for `get_order` or `get_ticker` it is repeated, so a test can
//! script "the order stays New" or "the price stays at 98" with a single push.
//! Every call is recorded for verification.

use std::collections::{HashMap, VecDeque};
use std::future::ready;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use perpx_core::{Price, Size, Symbol};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, ExchangeGateway};
use crate::types::{
    CancelAck, Depth, NewOrder, OrderAck, OrderSnapshot, PositionSnapshot, Ticker,
};

/// Scripted order status; side, flags and price come from the created order.
#[derive(Debug, Clone)]
struct StatusScript {
    status: String,
    cum_exec_qty: Size,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    acks: VecDeque<GatewayResult<OrderAck>>,
    statuses: VecDeque<GatewayResult<StatusScript>>,
    cancels: VecDeque<GatewayResult<CancelAck>>,
    prices: VecDeque<GatewayResult<Price>>,
    depth: Option<Depth>,
    position: Option<PositionSnapshot>,

    created: Vec<NewOrder>,
    orders_by_id: HashMap<String, NewOrder>,
    cancelled: Vec<String>,
    order_queries: usize,
    ticker_queries: usize,
    depth_queries: usize,
    position_queries: usize,
    leverage_calls: Vec<(Symbol, Decimal, Decimal)>,
}

/// Mock gateway for testing.
#[derive(Debug, Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

/// Pop the front, but keep the last element so it repeats.
fn sticky_front<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// Queue the answer to the next `create_order`. Unscripted creates are accepted.
    pub fn push_ack(&self, ack: GatewayResult<OrderAck>) {
        self.state.lock().acks.push_back(ack);
    }

    /// Queue a status for the next `get_order` with the cumulative executed quantity.
    pub fn push_status(&self, status: &str, cum_exec_qty: Size) {
        self.state.lock().statuses.push_back(Ok(StatusScript {
            status: status.to_string(),
            cum_exec_qty,
        }));
    }

    /// Queue a failure for the next `get_order`.
    pub fn push_status_error(&self, error: GatewayError) {
        self.state.lock().statuses.push_back(Err(error));
    }

    /// Queue the answer to the next `cancel_order`. Unscripted cancels are accepted.
    pub fn push_cancel(&self, result: GatewayResult<CancelAck>) {
        self.state.lock().cancels.push_back(result);
    }

    /// Queue the last price returned by the next `get_ticker`.
    pub fn push_last_price(&self, price: Price) {
        self.state.lock().prices.push_back(Ok(price));
    }

    pub fn push_ticker_error(&self, error: GatewayError) {
        self.state.lock().prices.push_back(Err(error));
    }

    pub fn set_depth(&self, depth: Depth) {
        self.state.lock().depth = Some(depth);
    }

    pub fn set_position(&self, position: PositionSnapshot) {
        self.state.lock().position = Some(position);
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Orders submitted, in submission order.
    pub fn created_orders(&self) -> Vec<NewOrder> {
        self.state.lock().created.clone()
    }

    /// Order IDs passed to `cancel_order`, in call order.
    pub fn cancelled_orders(&self) -> Vec<String> {
        self.state.lock().cancelled.clone()
    }

    pub fn order_queries(&self) -> usize {
        self.state.lock().order_queries
    }

    pub fn ticker_queries(&self) -> usize {
        self.state.lock().ticker_queries
    }

    pub fn leverage_calls(&self) -> Vec<(Symbol, Decimal, Decimal)> {
        self.state.lock().leverage_calls.clone()
    }

    /// Every gateway call of any kind.
    pub fn total_calls(&self) -> usize {
        let state = self.state.lock();
        state.created.len()
            + state.cancelled.len()
            + state.order_queries
            + state.ticker_queries
            + state.depth_queries
            + state.position_queries
            + state.leverage_calls.len()
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    fn handle_create(&self, order: &NewOrder) -> GatewayResult<OrderAck> {
        let mut state = self.state.lock();
        state.created.push(order.clone());

        let ack = match state.acks.pop_front() {
            Some(scripted) => scripted?,
            None => {
                state.next_id += 1;
                OrderAck::accepted(format!("mock-{}", state.next_id))
            }
        };
        if let Some(id) = &ack.order_id {
            state.orders_by_id.insert(id.clone(), order.clone());
        }
        Ok(ack)
    }

    fn handle_get_order(&self, order_id: &str) -> GatewayResult<OrderSnapshot> {
        let mut state = self.state.lock();
        state.order_queries += 1;

        let order = state
            .orders_by_id
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;
        let script = sticky_front(&mut state.statuses)
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))??;

        Ok(OrderSnapshot {
            order_id: order_id.to_string(),
            side: order.side,
            reduce_only: order.reduce_only,
            status: script.status,
            price: order.price,
            qty: order.size,
            cum_exec_qty: script.cum_exec_qty,
            cum_exec_value: script.cum_exec_qty.notional(order.price),
        })
    }

    fn handle_cancel(&self, order_id: &str) -> GatewayResult<CancelAck> {
        let mut state = self.state.lock();
        state.cancelled.push(order_id.to_string());
        state
            .cancels
            .pop_front()
            .unwrap_or_else(|| Ok(CancelAck::accepted()))
    }

    fn handle_ticker(&self, symbol: &Symbol) -> GatewayResult<Ticker> {
        let mut state = self.state.lock();
        state.ticker_queries += 1;
        let last_price = sticky_front(&mut state.prices).ok_or_else(|| GatewayError::Rejected {
            code: 10001,
            message: format!("no price scripted for {symbol}"),
        })??;
        Ok(Ticker {
            symbol: symbol.clone(),
            last_price,
        })
    }
}

impl ExchangeGateway for MockGateway {
    fn create_order<'a>(&'a self, order: &'a NewOrder) -> BoxFuture<'a, GatewayResult<OrderAck>> {
        Box::pin(ready(self.handle_create(order)))
    }

    fn cancel_order<'a>(
        &'a self,
        _symbol: &'a Symbol,
        order_id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<CancelAck>> {
        Box::pin(ready(self.handle_cancel(order_id)))
    }

    fn get_order<'a>(
        &'a self,
        _symbol: &'a Symbol,
        order_id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<OrderSnapshot>> {
        Box::pin(ready(self.handle_get_order(order_id)))
    }

    fn get_ticker<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<Ticker>> {
        Box::pin(ready(self.handle_ticker(symbol)))
    }

    fn get_depth<'a>(&'a self, _symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<Depth>> {
        let mut state = self.state.lock();
        state.depth_queries += 1;
        Box::pin(ready(Ok(state.depth.clone().unwrap_or_default())))
    }

    fn get_position<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<PositionSnapshot>> {
        let mut state = self.state.lock();
        state.position_queries += 1;
        let position = state
            .position
            .clone()
            .unwrap_or_else(|| PositionSnapshot::flat(symbol.clone()));
        Box::pin(ready(Ok(position)))
    }

    fn set_leverage<'a>(
        &'a self,
        symbol: &'a Symbol,
        buy_leverage: Decimal,
        sell_leverage: Decimal,
    ) -> BoxFuture<'a, GatewayResult<()>> {
        self.state
            .lock()
            .leverage_calls
            .push((symbol.clone(), buy_leverage, sell_leverage));
        Box::pin(ready(Ok(())))
    }
}
