//! Per-symbol serialization of executions.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use perpx_core::Symbol;

/// One async mutex per symbol. Shared between executors that trade the same account.
#[derive(Debug, Default)]
pub struct SymbolLocks {
    locks: DashMap<Symbol, Arc<Mutex<()>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `symbol`. Released when the guard drops.
    pub async fn acquire(&self, symbol: &Symbol) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self.locks.entry(symbol.clone()).or_default().clone();
        lock.lock_owned().await
    }

    /// True when someone currently holds `symbol`.
    pub fn is_locked(&self, symbol: &Symbol) -> bool {
        let Some(lock) = self.locks.get(symbol) else {
            return false;
        };
        let held = lock.try_lock().is_err();
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_per_symbol() {
        let locks = SymbolLocks::new();
        let btc = Symbol::new("BTCUSDT").unwrap();
        let eth = Symbol::new("ETHUSDT").unwrap();

        let guard = locks.acquire(&btc).await;
        assert!(locks.is_locked(&btc));
        assert!(!locks.is_locked(&eth));

        let _eth = locks.acquire(&eth).await;
        drop(guard);
        assert!(!locks.is_locked(&btc));
    }

    #[tokio::test]
    async fn test_second_acquire_waits() {
        let locks = Arc::new(SymbolLocks::new());
        let btc = Symbol::new("BTCUSDT").unwrap();

        let guard = locks.acquire(&btc).await;
        let waiter = {
            let locks = locks.clone();
            let btc = btc.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&btc).await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
