//! In-memory paper exchange.
//!
//! Matches orders against a per-symbol last price:
//! - Marketable limit orders (and market orders) fill completely at the last price.
//! - Resting orders fill at their limit price when [`PaperGateway::set_last_price`]
//!   crosses them.
//! - IOC/FOK orders that cannot fill are cancelled; marketable post-only orders
//!   are rejected.
//! - Reduce-only orders are refused when there is not enough opposing exposure.
//!
//! Positions are kept per side (hedge mode) with an average entry price.

use std::collections::{BTreeMap, HashMap};
use std::future::ready;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

use perpx_core::{OrderSide, OrderType, Price, RawOrderStatus, Size, Symbol, TimeInForce};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, ExchangeGateway};
use crate::types::{
    CancelAck, Depth, DepthLevel, NewOrder, OrderAck, OrderSnapshot, PositionLeg,
    PositionSnapshot, Ticker,
};

#[derive(Debug, Clone)]
struct PaperOrder {
    order: NewOrder,
    filled: Size,
    filled_value: Decimal,
    status: RawOrderStatus,
}

impl PaperOrder {
    fn remaining(&self) -> Size {
        self.order.size.saturating_sub(self.filled)
    }

    fn is_resting(&self) -> bool {
        matches!(
            self.status,
            RawOrderStatus::New | RawOrderStatus::PartiallyFilled
        )
    }

    fn crosses(&self, last: Price) -> bool {
        match self.order.side {
            OrderSide::Buy => self.order.price >= last,
            OrderSide::Sell => self.order.price <= last,
        }
    }
}

#[derive(Debug)]
struct PaperMarket {
    last_price: Price,
    /// Keyed by numeric order id so iteration follows submission order.
    orders: BTreeMap<u64, PaperOrder>,
    long: PositionLeg,
    short: PositionLeg,
    leverage: (Decimal, Decimal),
}

impl PaperMarket {
    fn new(last_price: Price) -> Self {
        Self {
            last_price,
            orders: BTreeMap::new(),
            long: PositionLeg::flat(OrderSide::Buy),
            short: PositionLeg::flat(OrderSide::Sell),
            leverage: (Decimal::ZERO, Decimal::ZERO),
        }
    }

    /// Leg an order with these flags reduces.
    fn opposing_leg(&self, side: OrderSide) -> &PositionLeg {
        match side {
            OrderSide::Sell => &self.long,
            OrderSide::Buy => &self.short,
        }
    }

    fn apply_fill(&mut self, order: &NewOrder, qty: Size, price: Price) {
        let leg = match (order.side, order.reduce_only) {
            (OrderSide::Buy, false) | (OrderSide::Sell, true) => &mut self.long,
            (OrderSide::Sell, false) | (OrderSide::Buy, true) => &mut self.short,
        };

        if order.reduce_only {
            leg.size = leg.size.saturating_sub(qty);
            if leg.size.is_zero() {
                leg.entry_price = Price::ZERO;
            }
        } else {
            let total = leg.size + qty;
            let cost = leg.size.notional(leg.entry_price) + qty.notional(price);
            leg.entry_price = Price::new(cost / total.inner());
            leg.size = total;
        }
    }
}

#[derive(Debug, Default)]
struct PaperState {
    next_id: u64,
    markets: HashMap<Symbol, PaperMarket>,
    /// order id -> symbol, for lookups by id.
    index: HashMap<u64, Symbol>,
}

/// Paper exchange.
#[derive(Debug, Default)]
pub struct PaperGateway {
    state: RwLock<PaperState>,
}

fn parse_id(order_id: &str) -> GatewayResult<u64> {
    order_id
        .parse()
        .map_err(|_| GatewayError::OrderNotFound(order_id.to_string()))
}

fn fill(paper: &mut PaperOrder, qty: Size, price: Price) {
    paper.filled = paper.filled + qty;
    paper.filled_value += qty.notional(price);
    paper.status = if paper.remaining().is_zero() {
        RawOrderStatus::Filled
    } else {
        RawOrderStatus::PartiallyFilled
    };
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a market at the given last price.
    pub fn with_market(self, symbol: Symbol, last_price: Price) -> Self {
        self.state
            .write()
            .markets
            .insert(symbol, PaperMarket::new(last_price));
        self
    }

    /// Move the last price and fill every resting order it crosses.
    pub fn set_last_price(&self, symbol: &Symbol, last_price: Price) {
        let mut state = self.state.write();
        let market = state
            .markets
            .entry(symbol.clone())
            .or_insert_with(|| PaperMarket::new(last_price));
        market.last_price = last_price;

        let crossed: Vec<u64> = market
            .orders
            .iter()
            .filter(|(_, o)| o.is_resting() && o.crosses(last_price))
            .map(|(id, _)| *id)
            .collect();

        for id in crossed {
            Self::fill_resting(market, id, None);
        }
    }

    /// Fill part of a resting order at its limit price.
    pub fn fill_partially(&self, order_id: &str, qty: Size) -> GatewayResult<()> {
        let id = parse_id(order_id)?;
        let mut state = self.state.write();
        let symbol = state
            .index
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;
        let market = state
            .markets
            .get_mut(&symbol)
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;
        Self::fill_resting(market, id, Some(qty));
        Ok(())
    }

    /// Fill up to `max_qty` (default: everything remaining) at the order's limit price.
    fn fill_resting(market: &mut PaperMarket, id: u64, max_qty: Option<Size>) {
        let Some(paper) = market.orders.get(&id) else {
            return;
        };
        if !paper.is_resting() {
            return;
        }

        let order = paper.order.clone();
        let mut qty = max_qty.map_or(paper.remaining(), |q| q.clamp_to(paper.remaining()));
        if order.reduce_only {
            qty = qty.clamp_to(market.opposing_leg(order.side).size);
        }

        if qty.is_zero() {
            if order.reduce_only {
                // Nothing left to reduce.
                if let Some(paper) = market.orders.get_mut(&id) {
                    paper.status = RawOrderStatus::Cancelled;
                }
            }
            return;
        }

        market.apply_fill(&order, qty, order.price);
        if let Some(paper) = market.orders.get_mut(&id) {
            fill(paper, qty, order.price);
        }
        debug!(order_id = id, qty = %qty, price = %order.price, "Paper order filled");
    }

    fn handle_create(&self, order: &NewOrder) -> GatewayResult<OrderAck> {
        let mut state = self.state.write();
        state.next_id += 1;
        let id = state.next_id;

        let Some(market) = state.markets.get_mut(&order.symbol) else {
            return Ok(OrderAck::refused(format!("unknown symbol {}", order.symbol)));
        };
        if !order.size.is_positive() {
            return Ok(OrderAck::refused("order qty must be positive"));
        }
        if order.order_type == OrderType::Limit && !order.price.is_positive() {
            return Ok(OrderAck::refused("limit price must be positive"));
        }
        if order.reduce_only && market.opposing_leg(order.side).size < order.size {
            return Ok(OrderAck::refused(
                "reduce-only order exceeds current position",
            ));
        }

        let last = market.last_price;
        let mut paper = PaperOrder {
            order: order.clone(),
            filled: Size::ZERO,
            filled_value: Decimal::ZERO,
            status: RawOrderStatus::New,
        };
        let marketable = order.order_type == OrderType::Market || paper.crosses(last);

        match (marketable, order.time_in_force) {
            (true, TimeInForce::PostOnly) => paper.status = RawOrderStatus::Rejected,
            (true, _) => {
                market.apply_fill(order, order.size, last);
                fill(&mut paper, order.size, last);
            }
            (false, TimeInForce::ImmediateOrCancel | TimeInForce::FillOrKill) => {
                paper.status = RawOrderStatus::Cancelled;
            }
            (false, _) => {}
        }

        debug!(
            order_id = id,
            symbol = %order.symbol,
            side = %order.side,
            status = %paper.status,
            "Paper order accepted"
        );
        market.orders.insert(id, paper);
        state.index.insert(id, order.symbol.clone());
        Ok(OrderAck::accepted(id.to_string()))
    }

    fn handle_cancel(&self, symbol: &Symbol, order_id: &str) -> GatewayResult<CancelAck> {
        let id = parse_id(order_id)?;
        let mut state = self.state.write();
        let paper = state
            .markets
            .get_mut(symbol)
            .and_then(|m| m.orders.get_mut(&id))
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;

        if !paper.is_resting() {
            return Err(GatewayError::NotCancellable(format!(
                "order {order_id} is {}",
                paper.status
            )));
        }
        paper.status = RawOrderStatus::Cancelled;
        Ok(CancelAck::accepted())
    }

    fn handle_get_order(&self, symbol: &Symbol, order_id: &str) -> GatewayResult<OrderSnapshot> {
        let id = parse_id(order_id)?;
        let state = self.state.read();
        let paper = state
            .markets
            .get(symbol)
            .and_then(|m| m.orders.get(&id))
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;

        Ok(OrderSnapshot {
            order_id: order_id.to_string(),
            side: paper.order.side,
            reduce_only: paper.order.reduce_only,
            status: paper.status.as_str().to_string(),
            price: paper.order.price,
            qty: paper.order.size,
            cum_exec_qty: paper.filled,
            cum_exec_value: paper.filled_value,
        })
    }

    fn with_market_ref<T>(
        &self,
        symbol: &Symbol,
        f: impl FnOnce(&PaperMarket) -> T,
    ) -> GatewayResult<T> {
        let state = self.state.read();
        state
            .markets
            .get(symbol)
            .map(f)
            .ok_or_else(|| GatewayError::Rejected {
                code: 10001,
                message: format!("unknown symbol {symbol}"),
            })
    }

    fn handle_depth(&self, symbol: &Symbol) -> GatewayResult<Depth> {
        self.with_market_ref(symbol, |market| {
            let mut bids: BTreeMap<Price, Size> = BTreeMap::new();
            let mut asks: BTreeMap<Price, Size> = BTreeMap::new();
            for paper in market.orders.values().filter(|o| o.is_resting()) {
                let book = match paper.order.side {
                    OrderSide::Buy => &mut bids,
                    OrderSide::Sell => &mut asks,
                };
                let level = book.entry(paper.order.price).or_insert(Size::ZERO);
                *level = *level + paper.remaining();
            }

            let level = |(price, size): (Price, Size)| DepthLevel { price, size };
            Depth {
                bids: bids.into_iter().rev().map(level).collect(),
                asks: asks.into_iter().map(level).collect(),
            }
        })
    }

    fn handle_set_leverage(
        &self,
        symbol: &Symbol,
        buy: Decimal,
        sell: Decimal,
    ) -> GatewayResult<()> {
        if buy.is_sign_negative() || sell.is_sign_negative() {
            return Err(GatewayError::Rejected {
                code: 10001,
                message: "leverage must not be negative".to_string(),
            });
        }
        let mut state = self.state.write();
        let market = state
            .markets
            .get_mut(symbol)
            .ok_or_else(|| GatewayError::Rejected {
                code: 10001,
                message: format!("unknown symbol {symbol}"),
            })?;
        market.leverage = (buy, sell);
        Ok(())
    }

    /// Leverage last set for `symbol` as (buy, sell).
    pub fn leverage(&self, symbol: &Symbol) -> Option<(Decimal, Decimal)> {
        self.state.read().markets.get(symbol).map(|m| m.leverage)
    }
}

impl ExchangeGateway for PaperGateway {
    fn create_order<'a>(&'a self, order: &'a NewOrder) -> BoxFuture<'a, GatewayResult<OrderAck>> {
        Box::pin(ready(self.handle_create(order)))
    }

    fn cancel_order<'a>(
        &'a self,
        symbol: &'a Symbol,
        order_id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<CancelAck>> {
        Box::pin(ready(self.handle_cancel(symbol, order_id)))
    }

    fn get_order<'a>(
        &'a self,
        symbol: &'a Symbol,
        order_id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<OrderSnapshot>> {
        Box::pin(ready(self.handle_get_order(symbol, order_id)))
    }

    fn get_ticker<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<Ticker>> {
        let ticker = self.with_market_ref(symbol, |m| Ticker {
            symbol: symbol.clone(),
            last_price: m.last_price,
        });
        Box::pin(ready(ticker))
    }

    fn get_depth<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<Depth>> {
        Box::pin(ready(self.handle_depth(symbol)))
    }

    fn get_position<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<PositionSnapshot>> {
        let position = self.with_market_ref(symbol, |m| PositionSnapshot {
            symbol: symbol.clone(),
            long: m.long,
            short: m.short,
        });
        Box::pin(ready(position))
    }

    fn set_leverage<'a>(
        &'a self,
        symbol: &'a Symbol,
        buy_leverage: Decimal,
        sell_leverage: Decimal,
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(ready(self.handle_set_leverage(
            symbol,
            buy_leverage,
            sell_leverage,
        )))
    }
}
