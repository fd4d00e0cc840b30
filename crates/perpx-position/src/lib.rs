//! Position management for perpx.
//!
//! # Key Components
//!
//! - [`ReversalOrchestrator`]: Close one side, then open the other only after a full close
//! - [`ReversalOutcome`]: Close leg result plus the open leg result, if it ran
//! - [`PositionView`]: Per-side and net position queries

pub mod error;
pub mod reversal;
pub mod view;

pub use error::{PositionError, PositionResult};
pub use reversal::{Leg, ReversalOrchestrator, ReversalOutcome};
pub use view::{NetDirection, NetPosition, PositionView};
