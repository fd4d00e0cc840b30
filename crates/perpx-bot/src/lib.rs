//! Perpetual swap trading assistant.
//!
//! Wires the executor, the reversal orchestrator and position queries
//! behind one account-level facade:
//! - [`SwapTrader`]: Order directions, reversals and market/position queries for one instrument
//! - [`AppConfig`]: TOML configuration with `PERPX_*` environment overrides
//! - [`Application`]: Runs CLI commands against the paper exchange

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod trader;

pub use app::Application;
pub use cli::{BookSideArg, Cli, Command};
pub use self::config::AppConfig;
pub use error::{AppError, AppResult};
pub use trader::{BookSide, OrderOptions, SwapTrader};
