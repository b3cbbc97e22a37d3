//! Fixed-timestep tick scheduling for Mineral.
//!
//! Three pieces:
//!
//! - [`TickScheduler`]: fires at a fixed period (50 ms by default),
//!   numbering ticks 1, 2, 3, ... with overrun detection and budget
//!   warnings.
//! - [`TickerRegistry`]: the set of [`Ticker`]s, keyed by entity id,
//!   that want a callback every tick.
//! - [`TickLoop`]: glues the two together: wait, publish the tick
//!   number, fire every ticker, repeat.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(TickerRegistry::new());
//! registry.add(EntityId(0), world_clock);
//! let tick_loop = TickLoop::new(TickConfig::default(), Arc::clone(&registry));
//! let counter = tick_loop.counter();
//! tick_loop.spawn();
//! ```

mod driver;
mod registry;
mod scheduler;

pub use driver::{TickCounter, TickLoop};
pub use registry::{Ticker, TickerRegistry};
pub use scheduler::{TickConfig, TickInfo, TickMetrics, TickPolicy, TickScheduler};

/// Re-exported so `Ticker` impls don't need their own `futures-util`
/// dependency.
pub use futures_util::future::BoxFuture;
