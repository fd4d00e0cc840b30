//! Order execution for perpx.
//!
//! Drives one order intention to a final disposition. A resting order may be
//! cancelled and reissued several times (a reissue chain) depending on the
//! [`RetryPolicy`].
//!
//! # Key Components
//!
//! - [`OrderExecutor`]: Submit, observe, cancel and reissue until a stop condition
//! - [`RetryPolicy`]: Price, time and automatic cancellation switches
//! - [`ExecutorConfig`]: Backtest switch, reissue cap and backoff
//! - [`CancelOutcome`]: Typed result of a cancel attempt
//! - [`SymbolLocks`]: Per-symbol serialization of executions
//!
//! # Policy branches (in `OrderExecutor::execute`)
//!
//! 1. Filled / Failed / Cancelled snapshot -> stop
//! 2. No policy enabled -> report the snapshot as-is
//! 3. Price moved past amplitude -> cancel, reissue at last price +/- offset
//! 4. Time cancellation -> wait, re-check, cancel, reissue
//! 5. Automatic cancellation -> cancel and report, never reissue

pub mod cancel;
pub mod error;
pub mod executor;
pub mod lock;
pub mod outcome;
pub mod policy;

pub use cancel::CancelOutcome;
pub use error::{ExecutorError, ExecutorResult};
pub use executor::OrderExecutor;
pub use lock::SymbolLocks;
pub use outcome::{OrderOutcome, StopReason};
pub use policy::{ExecutorConfig, ReissueTrigger, RetryPolicy};
