//! Application wiring.
//!
//! Builds the paper exchange, the executor and the [`SwapTrader`] from an
//! [`AppConfig`] and runs one CLI command at a time.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use perpx_core::Price;
use perpx_executor::OrderExecutor;
use perpx_gateway::PaperGateway;

use crate::cli::Command;
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::trader::{OrderOptions, SwapTrader};

pub struct Application {
    config: AppConfig,
    paper: Arc<PaperGateway>,
    trader: SwapTrader,
    shutdown: CancellationToken,
}

impl Application {
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let symbol = config.exchange.symbol()?;
        let paper = Arc::new(
            PaperGateway::new().with_market(symbol.clone(), Price::new(config.paper.initial_price)),
        );

        let shutdown = CancellationToken::new();
        let executor = Arc::new(
            OrderExecutor::new(paper.clone(), config.executor_config())
                .with_cancel_token(shutdown.clone()),
        );
        let trader = SwapTrader::connect(executor, &config.exchange, config.policy()).await?;

        info!(
            symbol = %symbol,
            initial_price = %config.paper.initial_price,
            backtest = config.trading.backtest,
            "Application initialized"
        );

        Ok(Self {
            config,
            paper,
            trader,
            shutdown,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn trader(&self) -> &SwapTrader {
        &self.trader
    }

    /// The simulated exchange behind the trader.
    pub fn paper(&self) -> &Arc<PaperGateway> {
        &self.paper
    }

    /// Cancelling this token stops in-flight executions at their next wait.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run one command and return its result as JSON.
    pub async fn run(&self, command: Command) -> AppResult<Value> {
        let trader = &self.trader;
        match command {
            Command::Buy(args) => {
                to_json(&trader.buy(args.price(), args.size(), args.options.into()).await?)
            }
            Command::Sell(args) => {
                to_json(&trader.sell(args.price(), args.size(), args.options.into()).await?)
            }
            Command::BuyToCover(args) => to_json(
                &trader
                    .buy_to_cover(args.price(), args.size(), args.options.into())
                    .await?,
            ),
            Command::SellShort(args) => to_json(
                &trader
                    .sell_short(args.price(), args.size(), args.options.into())
                    .await?,
            ),
            Command::ReverseLong(args) => {
                let options: OrderOptions = args.options.into();
                to_json(&trader.reverse_to_long(args.cover(), args.open(), options).await?)
            }
            Command::ReverseShort(args) => {
                let options: OrderOptions = args.options.into();
                to_json(&trader.reverse_to_short(args.cover(), args.open(), options).await?)
            }
            Command::Ticker => to_json(&trader.ticker().await?),
            Command::Depth { side } => to_json(&trader.depth(side.map(Into::into)).await?),
            Command::Position { net: true } => to_json(&trader.net_position().await?),
            Command::Position { net: false } => to_json(&trader.position().await?),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}
