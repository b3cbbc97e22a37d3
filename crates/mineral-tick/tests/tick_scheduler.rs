//! Integration tests for the tick scheduler and tick loop.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every
//! task is idle; `sleep_until` then resolves instantly and tick timing
//! is deterministic.

use std::sync::Arc;
use std::time::Duration;

use mineral_protocol::EntityId;
use mineral_tick::{
    BoxFuture, TickConfig, TickLoop, TickPolicy, TickScheduler, Ticker, TickerRegistry,
};
use parking_lot::Mutex;

// =========================================================================
// Helpers
// =========================================================================

fn config_20hz() -> TickConfig {
    TickConfig::default()
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<u64>>,
}

impl Ticker for Recorder {
    fn tick(&self, tick: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.seen.lock().push(tick) })
    }
}

/// Removes itself from its registry on the third tick.
struct SelfRemoving {
    id: EntityId,
    registry: Arc<TickerRegistry>,
    seen: Mutex<Vec<u64>>,
}

impl Ticker for SelfRemoving {
    fn tick(&self, tick: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.seen.lock().push(tick);
            if tick == 3 {
                self.registry.remove(self.id);
            }
        })
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_20hz_skip() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.period, Duration::from_millis(50));
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert!((cfg.rate_hz() - 20.0).abs() < 1e-9);
}

#[test]
fn test_validated_clamps_zero_period() {
    let cfg = TickConfig::with_period(Duration::ZERO).validated();
    assert_eq!(cfg.period, TickConfig::MIN_PERIOD);
}

#[test]
fn test_validated_clamps_threshold() {
    let cfg = TickConfig {
        budget_warn_threshold: 3.0,
        ..config_20hz()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

// =========================================================================
// Tick firing
// =========================================================================

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::new(config_20hz());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.period(), Duration::from_millis(50));
    assert_eq!(s.policy(), TickPolicy::Skip);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_first_tick_is_one() {
    let mut s = TickScheduler::new(config_20hz());
    let start = tokio::time::Instant::now();

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.dt, Duration::from_millis(50));
    assert!(!info.overrun);
    assert_eq!(info.periods_skipped, 0);
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_increase_by_exactly_one_per_period() {
    let mut s = TickScheduler::new(config_20hz());
    let start = tokio::time::Instant::now();

    for expected in 1..=20u64 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(start.elapsed(), Duration::from_millis(50 * expected));
    }
    assert_eq!(s.tick_count(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_overrun_skips_time_not_numbers() {
    let mut s = TickScheduler::new(config_20hz());
    s.wait_for_tick().await;

    // Stall for four periods.
    tokio::time::advance(Duration::from_millis(200)).await;

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 2);
    assert!(info.overrun);
    assert_eq!(info.periods_skipped, 3);
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 3);

    // The next tick is one full period after the late one.
    let before = tokio::time::Instant::now();
    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 3);
    assert!(!info.overrun);
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_original_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..config_20hz()
    });
    s.wait_for_tick().await;
    tokio::time::advance(Duration::from_millis(120)).await;

    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.periods_skipped, 0);

    // Original schedule had tick 3 at 150 ms; we are already at 170 ms.
    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 3);
    assert!(info.overrun);
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(config_20hz());
    let m = s.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_overruns, 0);
    assert_eq!(m.avg_tick_time, Duration::ZERO);
    assert_eq!(m.max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(config_20hz());
    s.record_tick_end();
    assert_eq!(s.metrics().total_ticks, 0);
    assert_eq!(s.metrics().budget_utilization, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_max_tick_time_tracked() {
    let mut s = TickScheduler::new(config_20hz());

    // record_tick_end measures wall-clock time, which the paused Tokio
    // clock does not control.
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert_eq!(s.metrics().total_ticks, 1);
    assert!(s.metrics().max_tick_time > Duration::ZERO);
    assert!(s.metrics().budget_utilization > 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_time_tracking() {
    let mut s = TickScheduler::new(TickConfig {
        metrics_enabled: false,
        ..config_20hz()
    });
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert_eq!(s.metrics().avg_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// TickLoop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_tick_loop_callbacks_see_strictly_increasing_ticks() {
    let registry = Arc::new(TickerRegistry::new());
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    registry.add(EntityId(0), a.clone());
    registry.add(EntityId(1), b.clone());

    let mut tick_loop = TickLoop::new(config_20hz(), Arc::clone(&registry));
    let counter = tick_loop.counter();
    assert_eq!(counter.get(), 0);

    for _ in 0..10 {
        tick_loop.step().await;
    }

    let expected: Vec<u64> = (1..=10).collect();
    assert_eq!(*a.seen.lock(), expected);
    assert_eq!(*b.seen.lock(), expected);
    assert_eq!(counter.get(), 10);
    assert_eq!(tick_loop.scheduler().metrics().total_ticks, 10);
}

#[tokio::test(start_paused = true)]
async fn test_tick_loop_ticker_may_remove_itself() {
    let registry = Arc::new(TickerRegistry::new());
    let id = EntityId(5);
    let ticker = Arc::new(SelfRemoving {
        id,
        registry: Arc::clone(&registry),
        seen: Mutex::new(Vec::new()),
    });
    registry.add(id, ticker.clone());

    let mut tick_loop = TickLoop::new(config_20hz(), Arc::clone(&registry));
    for _ in 0..5 {
        tick_loop.step().await;
    }

    assert_eq!(*ticker.seen.lock(), vec![1, 2, 3]);
    assert!(!registry.contains(id));
}

#[tokio::test(start_paused = true)]
async fn test_tick_loop_members_added_later_start_at_current_tick() {
    let registry = Arc::new(TickerRegistry::new());
    let mut tick_loop = TickLoop::new(config_20hz(), Arc::clone(&registry));
    tick_loop.step().await;
    tick_loop.step().await;

    let late = Arc::new(Recorder::default());
    registry.add(EntityId(9), late.clone());
    tick_loop.step().await;

    assert_eq!(*late.seen.lock(), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_tick_loop_spawn_runs_in_background() {
    let registry = Arc::new(TickerRegistry::new());
    let rec = Arc::new(Recorder::default());
    registry.add(EntityId(0), rec.clone());

    let tick_loop = TickLoop::new(config_20hz(), Arc::clone(&registry));
    let counter = tick_loop.counter();
    let handle = tick_loop.spawn();

    tokio::time::sleep(Duration::from_millis(175)).await;
    handle.abort();

    assert_eq!(counter.get(), 3);
    assert_eq!(*rec.seen.lock(), vec![1, 2, 3]);
}
