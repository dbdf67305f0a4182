//! Sweep policies: when a mutating call should first purge dead entries.
//!
//! A sweep is an O(n) pass over the backing store. Policies only decide
//! whether to run one; the map performs it and then calls
//! [`SweepPolicy::record_sweep`]. Every policy is best-effort: dead
//! entries can linger between sweeps and that is not a bug.
//!
//! Reclamation signals are injected rather than observed. [`EpochSweep`]
//! reads an [`EpochSource`] and [`IntervalSweep`] reads a [`Clock`], so
//! tests can simulate reclamation and the passage of time deterministically.

use core::cell::Cell;
use core::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Decides when the map purges tokens whose key has died.
pub trait SweepPolicy {
    /// Asked before each mutating call. `stored` is the raw entry count,
    /// dead entries included.
    fn should_sweep(&mut self, stored: usize) -> bool;

    /// Called after every completed sweep, whether or not this policy
    /// requested it.
    fn record_sweep(&mut self);
}

impl<P: SweepPolicy + ?Sized> SweepPolicy for Box<P> {
    fn should_sweep(&mut self, stored: usize) -> bool {
        (**self).should_sweep(stored)
    }
    fn record_sweep(&mut self) {
        (**self).record_sweep()
    }
}

/// Never sweeps on its own; purging only happens through `WeakMap::sweep`
/// and `WeakMap::len`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualSweep;

impl SweepPolicy for ManualSweep {
    fn should_sweep(&mut self, _stored: usize) -> bool {
        false
    }
    fn record_sweep(&mut self) {}
}

// ---- epoch-counted ----

/// A monotonically increasing count of reclamation events.
pub trait EpochSource {
    fn epoch(&self) -> u64;
}

impl<F: Fn() -> u64> EpochSource for F {
    fn epoch(&self) -> u64 {
        self()
    }
}

/// Shared, cloneable epoch counter.
///
/// Code that drops keys (or a test simulating it) calls
/// [`advance`](SharedEpoch::advance); every map watching a clone of the
/// counter sweeps on its next mutation.
#[derive(Clone, Debug, Default)]
pub struct SharedEpoch {
    count: Rc<Cell<u64>>,
}

impl SharedEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that reclamation happened.
    pub fn advance(&self) {
        self.count.set(self.count.get().wrapping_add(1));
    }
}

impl EpochSource for SharedEpoch {
    fn epoch(&self) -> u64 {
        self.count.get()
    }
}

/// Sweeps when the reclamation epoch moved since the last sweep.
///
/// The check on the common path is one load and compare; the full purge
/// only runs when reclamation plausibly happened.
pub struct EpochSweep<E> {
    source: E,
    last: u64,
}

impl<E: EpochSource> EpochSweep<E> {
    /// Starts in sync with the source: nothing to sweep yet.
    pub fn new(source: E) -> Self {
        let last = source.epoch();
        Self { source, last }
    }

    pub fn source(&self) -> &E {
        &self.source
    }

    /// Epoch observed at the last sweep.
    pub fn last_epoch(&self) -> u64 {
        self.last
    }
}

impl<E: EpochSource> SweepPolicy for EpochSweep<E> {
    fn should_sweep(&mut self, stored: usize) -> bool {
        let now = self.source.epoch();
        let due = now != self.last && stored > 0;
        log::trace!("epoch sweep check: last={} now={} due={}", self.last, now, due);
        due
    }

    fn record_sweep(&mut self) {
        self.last = self.source.epoch();
    }
}

impl<E: fmt::Debug> fmt::Debug for EpochSweep<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochSweep")
            .field("source", &self.source)
            .field("last", &self.last)
            .finish()
    }
}

// ---- interval-based ----

/// Source of monotonic time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// `Instant::now()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Default period between time-triggered sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Sweeps when more than `interval` has passed since the last sweep.
///
/// For hosts with no reclamation signal: trades precision for needing
/// nothing but a clock.
#[derive(Clone, Debug)]
pub struct IntervalSweep<C = SystemClock> {
    clock: C,
    interval: Duration,
    last: Instant,
}

impl IntervalSweep<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock, DEFAULT_SWEEP_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::with_clock(SystemClock, interval)
    }
}

impl Default for IntervalSweep<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> IntervalSweep<C> {
    /// The interval starts counting now.
    pub fn with_clock(clock: C, interval: Duration) -> Self {
        let last = clock.now();
        Self {
            clock,
            interval,
            last,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> SweepPolicy for IntervalSweep<C> {
    fn should_sweep(&mut self, stored: usize) -> bool {
        let elapsed = self.clock.now().saturating_duration_since(self.last);
        let due = elapsed > self.interval && stored > 0;
        log::trace!(
            "interval sweep check: elapsed={:?} interval={:?} due={}",
            elapsed,
            self.interval,
            due
        );
        due
    }

    fn record_sweep(&mut self) {
        self.last = self.clock.now();
    }
}
