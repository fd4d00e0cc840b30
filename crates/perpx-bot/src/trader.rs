//! Account-level facade for one perpetual swap instrument.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use perpx_core::{
    translate, OrderRecord, OrderRequest, OrderSide, OrderType, PositionEffect, Price, Size,
    Symbol, TimeInForce,
};
use perpx_executor::{OrderExecutor, OrderOutcome, RetryPolicy};
use perpx_gateway::{CancelAck, Depth, DynGateway, PositionSnapshot, Ticker};
use perpx_position::{Leg, NetPosition, PositionView, ReversalOrchestrator, ReversalOutcome};

use crate::config::ExchangeConfig;
use crate::error::AppResult;

/// Order type and time in force. Defaults to a GTC limit order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOptions {
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
}

/// Which side of the book to return from [`SwapTrader::depth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bids,
    Asks,
}

pub struct SwapTrader {
    symbol: Symbol,
    gateway: DynGateway,
    executor: Arc<OrderExecutor>,
    orchestrator: ReversalOrchestrator,
    view: PositionView,
    policy: RetryPolicy,
}

impl SwapTrader {
    /// Bind to the configured instrument and set its leverage.
    ///
    /// Leverage is left untouched in backtest mode.
    pub async fn connect(
        executor: Arc<OrderExecutor>,
        exchange: &ExchangeConfig,
        policy: RetryPolicy,
    ) -> AppResult<Self> {
        let symbol = exchange.symbol()?;
        let gateway = executor.gateway().clone();

        if !executor.config().backtest {
            let (buy, sell) = exchange.leverage_pair();
            gateway.set_leverage(&symbol, buy, sell).await?;
            info!(
                symbol = %symbol,
                margin_mode = ?exchange.margin_mode,
                buy_leverage = %buy,
                sell_leverage = %sell,
                "Leverage configured"
            );
        }

        Ok(Self {
            orchestrator: ReversalOrchestrator::new(executor.clone()),
            view: PositionView::new(gateway.clone()),
            symbol,
            gateway,
            executor,
            policy,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn request(
        &self,
        side: OrderSide,
        effect: PositionEffect,
        price: Price,
        size: Size,
        options: OrderOptions,
    ) -> OrderRequest {
        OrderRequest::limit(self.symbol.clone(), side, effect, price, size)
            .with_order_type(options.order_type)
            .with_time_in_force(options.time_in_force)
    }

    async fn place(
        &self,
        side: OrderSide,
        effect: PositionEffect,
        price: Price,
        size: Size,
        options: OrderOptions,
    ) -> AppResult<OrderOutcome> {
        let request = self.request(side, effect, price, size, options);
        Ok(self.executor.execute(&request, &self.policy).await?)
    }

    /// Open long.
    pub async fn buy(&self, price: Price, size: Size, options: OrderOptions) -> AppResult<OrderOutcome> {
        self.place(OrderSide::Buy, PositionEffect::Open, price, size, options)
            .await
    }

    /// Close long.
    pub async fn sell(&self, price: Price, size: Size, options: OrderOptions) -> AppResult<OrderOutcome> {
        self.place(OrderSide::Sell, PositionEffect::Close, price, size, options)
            .await
    }

    /// Close short.
    pub async fn buy_to_cover(
        &self,
        price: Price,
        size: Size,
        options: OrderOptions,
    ) -> AppResult<OrderOutcome> {
        self.place(OrderSide::Buy, PositionEffect::Close, price, size, options)
            .await
    }

    /// Open short.
    pub async fn sell_short(
        &self,
        price: Price,
        size: Size,
        options: OrderOptions,
    ) -> AppResult<OrderOutcome> {
        self.place(OrderSide::Sell, PositionEffect::Open, price, size, options)
            .await
    }

    /// Cover the short, then open a long once the cover filled.
    pub async fn reverse_to_long(
        &self,
        cover: Leg,
        open: Leg,
        options: OrderOptions,
    ) -> AppResult<ReversalOutcome> {
        self.reverse(OrderSide::Buy, cover, open, options).await
    }

    /// Sell the long, then open a short once the sale filled.
    pub async fn reverse_to_short(
        &self,
        cover: Leg,
        open: Leg,
        options: OrderOptions,
    ) -> AppResult<ReversalOutcome> {
        self.reverse(OrderSide::Sell, cover, open, options).await
    }

    async fn reverse(
        &self,
        side: OrderSide,
        cover: Leg,
        open: Leg,
        options: OrderOptions,
    ) -> AppResult<ReversalOutcome> {
        let close = self.request(side, PositionEffect::Close, cover.price, cover.size, options);
        let open = self.request(side, PositionEffect::Open, open.price, open.size, options);
        Ok(self.orchestrator.reverse(&close, &open, &self.policy).await?)
    }

    pub async fn ticker(&self) -> AppResult<Ticker> {
        Ok(self.gateway.get_ticker(&self.symbol).await?)
    }

    /// Value of one contract in quote currency (the last price).
    pub async fn contract_value(&self) -> AppResult<Price> {
        Ok(self.ticker().await?.last_price)
    }

    /// Order book; `side` keeps only bids or only asks.
    pub async fn depth(&self, side: Option<BookSide>) -> AppResult<Depth> {
        let mut depth = self.gateway.get_depth(&self.symbol).await?;
        match side {
            Some(BookSide::Bids) => depth.asks.clear(),
            Some(BookSide::Asks) => depth.bids.clear(),
            None => {}
        }
        Ok(depth)
    }

    pub async fn position(&self) -> AppResult<PositionSnapshot> {
        Ok(self.view.positions_both(&self.symbol).await?)
    }

    pub async fn net_position(&self) -> AppResult<NetPosition> {
        Ok(self.view.net_position(&self.symbol).await?)
    }

    /// Current state of one order, translated.
    pub async fn order_info(&self, order_id: &str) -> AppResult<OrderRecord> {
        let snapshot = self.gateway.get_order(&self.symbol, order_id).await?;
        let effect = PositionEffect::from_reduce_only(snapshot.reduce_only);
        let translation = translate(&snapshot.status, snapshot.side, effect)?;

        Ok(OrderRecord::observed(
            snapshot.order_id,
            self.symbol.clone(),
            snapshot.side,
            effect,
            snapshot.price,
            snapshot.qty,
            snapshot.cum_exec_qty,
            snapshot.cum_exec_value,
            translation,
        ))
    }

    /// Cancel one order. The ack says whether the exchange took the request.
    pub async fn revoke_order(&self, order_id: &str) -> AppResult<CancelAck> {
        let ack = self.gateway.cancel_order(&self.symbol, order_id).await?;
        info!(symbol = %self.symbol, order_id, accepted = ack.accepted, "Order revoke");
        Ok(ack)
    }
}
