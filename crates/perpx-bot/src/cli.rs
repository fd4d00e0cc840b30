//! Command-line interface.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use perpx_core::{OrderType, Price, Size, TimeInForce};
use perpx_position::Leg;

use crate::trader::{BookSide, OrderOptions};

/// Perpetual swap trading assistant (paper exchange)
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (can also be set via PERPX_CONFIG env var)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Simulate orders without touching the exchange
    #[arg(long, global = true)]
    pub backtest: bool,

    /// Starting last price of the paper market
    #[arg(long, global = true)]
    pub price: Option<Decimal>,

    /// Write Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open long
    Buy(OrderArgs),
    /// Close long
    Sell(OrderArgs),
    /// Close short
    BuyToCover(OrderArgs),
    /// Open short
    SellShort(OrderArgs),
    /// Cover the short, then open a long
    ReverseLong(ReversalArgs),
    /// Sell the long, then open a short
    ReverseShort(ReversalArgs),
    /// Last traded price
    Ticker,
    /// Order book
    Depth {
        #[arg(long, value_enum)]
        side: Option<BookSideArg>,
    },
    /// Long and short legs, or the net position with --net
    Position {
        #[arg(long)]
        net: bool,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct OrderArgs {
    pub price: Decimal,
    pub size: Decimal,
    #[command(flatten)]
    pub options: OptionArgs,
}

impl OrderArgs {
    pub fn price(&self) -> Price {
        Price::new(self.price)
    }

    pub fn size(&self) -> Size {
        Size::new(self.size)
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ReversalArgs {
    pub cover_price: Decimal,
    pub cover_size: Decimal,
    pub open_price: Decimal,
    pub open_size: Decimal,
    #[command(flatten)]
    pub options: OptionArgs,
}

impl ReversalArgs {
    pub fn cover(&self) -> Leg {
        Leg::new(Price::new(self.cover_price), Size::new(self.cover_size))
    }

    pub fn open(&self) -> Leg {
        Leg::new(Price::new(self.open_price), Size::new(self.open_size))
    }
}

#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionArgs {
    #[arg(long = "type", value_enum, default_value_t)]
    pub order_type: OrderTypeArg,
    #[arg(long = "tif", value_enum, default_value_t)]
    pub time_in_force: TimeInForceArg,
}

impl From<OptionArgs> for OrderOptions {
    fn from(args: OptionArgs) -> Self {
        Self {
            order_type: args.order_type.into(),
            time_in_force: args.time_in_force.into(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderTypeArg {
    #[default]
    Limit,
    Market,
}

impl From<OrderTypeArg> for OrderType {
    fn from(arg: OrderTypeArg) -> Self {
        match arg {
            OrderTypeArg::Limit => Self::Limit,
            OrderTypeArg::Market => Self::Market,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeInForceArg {
    #[default]
    Gtc,
    Ioc,
    Fok,
    PostOnly,
}

impl From<TimeInForceArg> for TimeInForce {
    fn from(arg: TimeInForceArg) -> Self {
        match arg {
            TimeInForceArg::Gtc => Self::GoodTillCancel,
            TimeInForceArg::Ioc => Self::ImmediateOrCancel,
            TimeInForceArg::Fok => Self::FillOrKill,
            TimeInForceArg::PostOnly => Self::PostOnly,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSideArg {
    Bids,
    Asks,
}

impl From<BookSideArg> for BookSide {
    fn from(arg: BookSideArg) -> Self {
        match arg {
            BookSideArg::Bids => Self::Bids,
            BookSideArg::Asks => Self::Asks,
        }
    }
}
