//! Tick-callback registry.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use mineral_protocol::EntityId;
use parking_lot::RwLock;

/// Something that wants to be told about every tick.
///
/// `tick` returns a boxed future so tickers of different types can live
/// in one registry as `Arc<dyn Ticker>`. A ticker handles its own
/// failures; nothing is returned to the loop.
pub trait Ticker: Send + Sync + 'static {
    /// Called once per tick with the current tick number.
    fn tick(&self, tick: u64) -> BoxFuture<'_, ()>;
}

/// Concurrent map from entity id to ticker.
///
/// Mutation takes the write lock briefly. Firing a tick copies the
/// members out under the read lock and runs them with no lock held, so a
/// ticker may add or remove registry members (including itself) while
/// it runs.
#[derive(Default)]
pub struct TickerRegistry {
    tickers: RwLock<HashMap<EntityId, Arc<dyn Ticker>>>,
}

impl TickerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ticker` under `id`, returning the ticker it replaced.
    pub fn add(&self, id: EntityId, ticker: Arc<dyn Ticker>) -> Option<Arc<dyn Ticker>> {
        self.tickers.write().insert(id, ticker)
    }

    /// Removes the ticker under `id`. Returns `false` if there was none,
    /// so removing twice is harmless.
    pub fn remove(&self, id: EntityId) -> bool {
        self.tickers.write().remove(&id).is_some()
    }

    /// Returns `true` if a ticker is registered under `id`.
    pub fn contains(&self, id: EntityId) -> bool {
        self.tickers.read().contains_key(&id)
    }

    /// Number of registered tickers.
    pub fn len(&self) -> usize {
        self.tickers.read().len()
    }

    /// Returns `true` if no tickers are registered.
    pub fn is_empty(&self) -> bool {
        self.tickers.read().is_empty()
    }

    /// Copies the current members out of the registry.
    pub fn snapshot(&self) -> Vec<(EntityId, Arc<dyn Ticker>)> {
        self.tickers
            .read()
            .iter()
            .map(|(id, ticker)| (*id, Arc::clone(ticker)))
            .collect()
    }

    /// Calls every member's `tick` concurrently and waits for all of
    /// them. A panicking ticker is logged and does not affect the others
    /// or the caller.
    pub async fn fire(&self, tick: u64) {
        let members = self.snapshot();
        let calls = members.iter().map(|(id, ticker)| async move {
            if AssertUnwindSafe(ticker.tick(tick)).catch_unwind().await.is_err() {
                tracing::error!(%id, tick, "ticker panicked");
            }
        });
        join_all(calls).await;
    }
}

impl std::fmt::Debug for TickerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder(Mutex<Vec<u64>>);

    impl Ticker for Recorder {
        fn tick(&self, tick: u64) -> BoxFuture<'_, ()> {
            Box::pin(async move { self.0.lock().push(tick) })
        }
    }

    struct Panicker;

    impl Ticker for Panicker {
        fn tick(&self, _tick: u64) -> BoxFuture<'_, ()> {
            Box::pin(async { panic!("boom") })
        }
    }

    #[test]
    fn test_add_remove_contains() {
        let registry = TickerRegistry::new();
        let ticker: Arc<dyn Ticker> = Arc::new(Recorder(Mutex::new(vec![])));
        assert!(registry.add(EntityId(1), ticker.clone()).is_none());
        assert!(registry.add(EntityId(1), ticker).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(EntityId(1)));

        assert!(registry.remove(EntityId(1)));
        assert!(!registry.remove(EntityId(1)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_fire_visits_every_member_once() {
        let registry = TickerRegistry::new();
        let a = Arc::new(Recorder(Mutex::new(vec![])));
        let b = Arc::new(Recorder(Mutex::new(vec![])));
        registry.add(EntityId(1), a.clone());
        registry.add(EntityId(2), b.clone());

        registry.fire(7).await;

        assert_eq!(*a.0.lock(), vec![7]);
        assert_eq!(*b.0.lock(), vec![7]);
    }

    #[tokio::test]
    async fn test_fire_survives_panicking_ticker() {
        let registry = TickerRegistry::new();
        let good = Arc::new(Recorder(Mutex::new(vec![])));
        registry.add(EntityId(1), Arc::new(Panicker));
        registry.add(EntityId(2), good.clone());

        registry.fire(1).await;
        registry.fire(2).await;

        assert_eq!(*good.0.lock(), vec![1, 2]);
    }
}
