//! Position queries.

use serde::{Deserialize, Serialize};
use std::fmt;

use perpx_core::{Price, Size, Symbol};
use perpx_gateway::{DynGateway, PositionSnapshot};

use crate::error::PositionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetDirection {
    Long,
    Short,
    Flat,
}

impl fmt::Display for NetDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Single-direction view of a hedge-mode position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPosition {
    pub direction: NetDirection,
    pub size: Size,
    /// Entry price of the dominant leg; zero when flat.
    pub entry_price: Price,
}

impl NetPosition {
    pub fn flat() -> Self {
        Self {
            direction: NetDirection::Flat,
            size: Size::ZERO,
            entry_price: Price::ZERO,
        }
    }

    /// Net the two legs. When both are open the larger one wins by the difference.
    pub fn from_snapshot(snapshot: &PositionSnapshot) -> Self {
        let long = snapshot.long;
        let short = snapshot.short;

        if long.size > short.size {
            Self {
                direction: NetDirection::Long,
                size: long.size.saturating_sub(short.size),
                entry_price: long.entry_price,
            }
        } else if short.size > long.size {
            Self {
                direction: NetDirection::Short,
                size: short.size.saturating_sub(long.size),
                entry_price: short.entry_price,
            }
        } else {
            Self::flat()
        }
    }
}

/// Reads positions through a gateway.
#[derive(Clone)]
pub struct PositionView {
    gateway: DynGateway,
}

impl PositionView {
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    /// Long and short legs; absent legs come back zeroed.
    pub async fn positions_both(&self, symbol: &Symbol) -> PositionResult<PositionSnapshot> {
        Ok(self.gateway.get_position(symbol).await?)
    }

    pub async fn net_position(&self, symbol: &Symbol) -> PositionResult<NetPosition> {
        let snapshot = self.positions_both(symbol).await?;
        Ok(NetPosition::from_snapshot(&snapshot))
    }
}
