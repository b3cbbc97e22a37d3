//! The loop that turns scheduler ticks into registry calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{TickConfig, TickInfo, TickScheduler, TickerRegistry};

/// Shared, read-only view of the current tick number.
///
/// Cheap to clone. Reads 0 before the first tick.
#[derive(Debug, Clone, Default)]
pub struct TickCounter(Arc<AtomicU64>);

impl TickCounter {
    /// Creates a counter at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of the most recent tick.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, tick: u64) {
        self.0.store(tick, Ordering::Release);
    }
}

/// Drives a [`TickerRegistry`] from a [`TickScheduler`].
///
/// Each step waits for the next tick, publishes its number through the
/// [`TickCounter`], then fires every registered ticker.
pub struct TickLoop {
    scheduler: TickScheduler,
    registry: Arc<TickerRegistry>,
    counter: TickCounter,
}

impl TickLoop {
    /// Creates a loop over `registry`.
    pub fn new(config: TickConfig, registry: Arc<TickerRegistry>) -> Self {
        Self {
            scheduler: TickScheduler::new(config),
            registry,
            counter: TickCounter::new(),
        }
    }

    /// Returns a handle to the tick number this loop publishes.
    pub fn counter(&self) -> TickCounter {
        self.counter.clone()
    }

    /// Runs exactly one tick.
    pub async fn step(&mut self) -> TickInfo {
        let info = self.scheduler.wait_for_tick().await;
        self.counter.set(info.tick);
        self.registry.fire(info.tick).await;
        self.scheduler.record_tick_end();
        info
    }

    /// Runs forever.
    pub async fn run(mut self) {
        tracing::info!(
            period_ms = self.scheduler.period().as_millis() as u64,
            "tick loop started"
        );
        loop {
            self.step().await;
        }
    }

    /// Spawns [`run`](Self::run) onto the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// The underlying scheduler, for metrics.
    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }
}
