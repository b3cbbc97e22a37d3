//! Fixed-timestep scheduler.
//!
//! Ticks are numbered 1, 2, 3, ... with no gaps. A stall never produces a
//! burst of catch-up ticks under the default policy; the numbers stay
//! consecutive and only the wall-clock spacing stretches.

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Schedule the next tick one period after the late one.
    #[default]
    Skip,
    /// Keep the original cadence, even if the next deadline has already
    /// passed.
    Drop,
}

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Default: 50 ms (20 Hz).
    pub period: Duration,
    pub policy: TickPolicy,
    /// Fraction of the period (0.0 to 1.0) after which a slow tick is
    /// logged as a warning. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Track callback timings in [`TickMetrics`].
    pub metrics_enabled: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            metrics_enabled: true,
        }
    }
}

impl TickConfig {
    /// 20 ticks per second.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(50);

    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. [`TickScheduler::new`] calls this.
    pub fn validated(self) -> Self {
        let period = if self.period < Self::MIN_PERIOD {
            warn!(period = ?self.period, "tick period too short, using {:?}", Self::MIN_PERIOD);
            Self::MIN_PERIOD
        } else {
            self.period
        };
        Self {
            period,
            budget_warn_threshold: self.budget_warn_threshold.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn rate_hz(&self) -> f64 {
        1.0 / self.period.as_secs_f64()
    }
}

/// One fired tick, as returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Fixed period of the scheduler.
    pub dt: Duration,
    /// Fired more than a tenth of a period after its deadline.
    pub overrun: bool,
    /// Whole periods that went by without a tick (Skip policy only).
    pub periods_skipped: u64,
}

/// Counters and timings kept by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Moving average of callback time, weighting the newest tick 10%.
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's callback time as a fraction of the period.
    pub budget_utilization: f64,
}

impl TickMetrics {
    const AVG_WEIGHT: f64 = 0.1;

    fn record_duration(&mut self, elapsed: Duration) {
        self.max_tick_time = self.max_tick_time.max(elapsed);
        let avg = self.avg_tick_time.as_secs_f64() * (1.0 - Self::AVG_WEIGHT)
            + elapsed.as_secs_f64() * Self::AVG_WEIGHT;
        self.avg_tick_time = Duration::from_secs_f64(avg);
    }
}

/// Waits out a fixed period between ticks.
///
/// Only timing lives here. The work done per tick belongs to the caller;
/// [`TickLoop`](crate::TickLoop) pairs a scheduler with a
/// [`TickerRegistry`](crate::TickerRegistry).
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    deadline: TokioInstant,
    /// Wall-clock start of the current tick's work.
    work_started: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// The first tick is due one period from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(period = ?config.period, policy = ?config.policy, "tick scheduler created");
        Self {
            deadline: TokioInstant::now() + config.period,
            config,
            tick_count: 0,
            work_started: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Sleeps until the next deadline, then numbers the tick and sets the
    /// following deadline according to the policy.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.deadline;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        let period = self.config.period;
        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > period / 10;

        self.tick_count += 1;
        self.work_started = Some(Instant::now());

        let periods_skipped = match self.config.policy {
            TickPolicy::Skip => {
                self.deadline = now + period;
                if overrun {
                    (late_by.as_nanos() / period.as_nanos()) as u64
                } else {
                    0
                }
            }
            TickPolicy::Drop => {
                self.deadline = due + period;
                0
            }
        };

        if overrun {
            warn!(
                tick = self.tick_count,
                late = ?late_by,
                skipped = periods_skipped,
                policy = ?self.config.policy,
                "tick fired late"
            );
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += periods_skipped;
        self.metrics.total_ticks += 1;
        trace!(tick = self.tick_count, "tick");

        TickInfo {
            tick: self.tick_count,
            dt: period,
            overrun,
            periods_skipped,
        }
    }

    /// Marks the current tick's work as done and checks it against the
    /// period. Does nothing unless a tick is in progress.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.period.as_secs_f64();
        self.metrics.budget_utilization = utilization;

        if utilization >= 1.0 {
            warn!(tick = self.tick_count, ?elapsed, "tick work exceeded the period");
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                ?elapsed,
                utilization = format!("{:.0}%", utilization * 100.0),
                "tick work close to the period"
            );
        }

        if self.config.metrics_enabled {
            self.metrics.record_duration(elapsed);
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    pub fn policy(&self) -> TickPolicy {
        self.config.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_duration_tracks_max_and_average() {
        let mut m = TickMetrics::default();
        m.record_duration(Duration::from_millis(10));
        m.record_duration(Duration::from_millis(4));
        assert_eq!(m.max_tick_time, Duration::from_millis(10));
        // 0.9 * 1 ms + 0.1 * 4 ms
        let avg_ms = m.avg_tick_time.as_secs_f64() * 1000.0;
        assert!((avg_ms - 1.3).abs() < 1e-6, "got {avg_ms}");
    }
}
