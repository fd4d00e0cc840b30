//! Exchange gateway contract for perpx.
//!
//! The executor only talks to an exchange through [`ExchangeGateway`].
//! Authentication, transport and wire formats live behind implementations
//! of that trait.
//!
//! # Key Components
//!
//! - [`ExchangeGateway`]: Submit, cancel and query orders; read ticker, depth and positions
//! - [`MockGateway`]: Scripted responses and call recording for tests
//! - [`PaperGateway`]: In-memory exchange that matches orders against a last price

pub mod error;
pub mod gateway;
pub mod mock;
pub mod paper;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{BoxFuture, DynGateway, ExchangeGateway};
pub use mock::MockGateway;
pub use paper::PaperGateway;
pub use types::{
    CancelAck, Depth, DepthLevel, NewOrder, OrderAck, OrderSnapshot, PositionLeg,
    PositionSnapshot, Ticker,
};
