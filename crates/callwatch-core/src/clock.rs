//! Injectable time sources for call timing.
//!
//! A [`Clock`] supplies two readings: a [`Tick`] for measuring elapsed
//! time and a wall-clock timestamp in milliseconds since the Unix epoch.
//! [`probe_clock`] picks the best implementation for the platform.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Opaque reading from a [`Clock`], in nanoseconds from the clock's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(u64);

impl Tick {
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

/// Which implementation a clock is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockKind {
    /// High-resolution monotonic timer.
    Monotonic,
    /// Coarse wall-clock fallback.
    Wall,
    /// Deterministic test clock.
    Manual,
}

impl fmt::Display for ClockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monotonic => write!(f, "monotonic"),
            Self::Wall => write!(f, "wall"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Time source used by monitors.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Reading for elapsed-time measurement.
    fn now(&self) -> Tick;

    /// Milliseconds since the Unix epoch.
    fn epoch_millis(&self) -> u64;

    fn kind(&self) -> ClockKind;

    /// Time elapsed since `start`.
    fn elapsed(&self, start: Tick) -> Duration {
        self.now().saturating_since(start)
    }
}

fn system_epoch() -> Duration {
    // A clock set before 1970 reads as the epoch itself.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

fn system_epoch_millis() -> u64 {
    u64::try_from(system_epoch().as_millis()).unwrap_or(u64::MAX)
}

/// High-resolution clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Tick {
        Tick(u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX))
    }

    fn epoch_millis(&self) -> u64 {
        system_epoch_millis()
    }

    fn kind(&self) -> ClockKind {
        ClockKind::Monotonic
    }
}

/// Millisecond-resolution clock backed by [`SystemTime`].
///
/// Backwards jumps of the system clock produce zero-length measurements
/// rather than underflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for WallClock {
    fn now(&self) -> Tick {
        Tick(system_epoch_millis().saturating_mul(1_000_000))
    }

    fn epoch_millis(&self) -> u64 {
        system_epoch_millis()
    }

    fn kind(&self) -> ClockKind {
        ClockKind::Wall
    }
}

/// Deterministic clock for tests.
///
/// Every call to [`Clock::now`] returns the current reading and then
/// advances by a fixed tick, so a measured call lasts exactly one tick.
/// The epoch timestamp is `epoch_ms` plus the whole milliseconds elapsed.
#[derive(Debug)]
pub struct ManualClock {
    now_ns: AtomicU64,
    tick_ns: u64,
    epoch_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at `start_ns` that advances `tick_ns` per reading.
    #[must_use]
    pub const fn new(start_ns: u64, tick_ns: u64) -> Self {
        Self {
            now_ns: AtomicU64::new(start_ns),
            tick_ns,
            epoch_ms: AtomicU64::new(0),
        }
    }

    /// Set the epoch base reported by [`Clock::epoch_millis`].
    #[must_use]
    pub fn with_epoch_millis(self, epoch_ms: u64) -> Self {
        self.epoch_ms.store(epoch_ms, Ordering::SeqCst);
        self
    }

    /// Current reading without advancing.
    #[must_use]
    pub fn peek(&self) -> Tick {
        Tick(self.now_ns.load(Ordering::SeqCst))
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.now_ns.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Jump to an absolute reading.
    pub fn set(&self, nanos: u64) {
        self.now_ns.store(nanos, Ordering::SeqCst);
    }

    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_nanos(self.tick_ns)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        // 1ms tick
        Self::new(0, 1_000_000)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick(self.now_ns.fetch_add(self.tick_ns, Ordering::SeqCst))
    }

    fn epoch_millis(&self) -> u64 {
        self.epoch_ms.load(Ordering::SeqCst) + self.now_ns.load(Ordering::SeqCst) / 1_000_000
    }

    fn kind(&self) -> ClockKind {
        ClockKind::Manual
    }
}

/// Whether this platform offers a monotonic timer.
///
/// `wasm32` without WASI has no host time source behind [`Instant`].
#[must_use]
pub const fn has_monotonic_timer() -> bool {
    !cfg!(all(target_arch = "wasm32", not(target_os = "wasi")))
}

/// Pick the best clock for this platform.
#[must_use]
pub fn probe_clock() -> Arc<dyn Clock> {
    if has_monotonic_timer() {
        Arc::new(MonotonicClock::new())
    } else {
        Arc::new(WallClock::new())
    }
}

static DEFAULT_CLOCK: OnceLock<Arc<dyn Clock>> = OnceLock::new();

/// Process-wide clock chosen by [`probe_clock`] on first use.
#[must_use]
pub fn default_clock() -> Arc<dyn Clock> {
    Arc::clone(DEFAULT_CLOCK.get_or_init(probe_clock))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_saturating_since() {
        let a = Tick::from_nanos(100);
        let b = Tick::from_nanos(250);
        assert_eq!(b.saturating_since(a), Duration::from_nanos(150));
        assert_eq!(a.saturating_since(b), Duration::ZERO);
    }

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert_eq!(clock.kind(), ClockKind::Monotonic);
    }

    #[test]
    fn test_wall_clock_epoch_is_recent() {
        let clock = WallClock::new();
        // 2020-01-01T00:00:00Z
        assert!(clock.epoch_millis() > 1_577_836_800_000);
        assert_eq!(clock.kind(), ClockKind::Wall);
    }

    #[test]
    fn test_wall_clock_millisecond_resolution() {
        let clock = WallClock::new();
        assert_eq!(clock.now().as_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_manual_clock_advances_one_tick_per_reading() {
        let clock = ManualClock::new(0, 5);
        let start = clock.now();
        assert_eq!(clock.elapsed(start), Duration::from_nanos(5));
        assert_eq!(clock.peek(), Tick::from_nanos(10));
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new(0, 0);
        clock.advance(Duration::from_millis(3));
        assert_eq!(clock.peek().as_nanos(), 3_000_000);
        clock.set(42);
        assert_eq!(clock.now(), Tick::from_nanos(42));
    }

    #[test]
    fn test_manual_clock_epoch() {
        let clock = ManualClock::new(0, 0).with_epoch_millis(1_000);
        assert_eq!(clock.epoch_millis(), 1_000);
        clock.advance(Duration::from_millis(7));
        assert_eq!(clock.epoch_millis(), 1_007);
        assert_eq!(clock.kind(), ClockKind::Manual);
    }

    #[test]
    fn test_manual_clock_default_tick() {
        assert_eq!(ManualClock::default().tick(), Duration::from_millis(1));
    }

    #[test]
    fn test_probe_clock_on_native() {
        assert!(has_monotonic_timer());
        assert_eq!(probe_clock().kind(), ClockKind::Monotonic);
    }

    #[test]
    fn test_default_clock_is_shared() {
        let a = default_clock();
        let b = default_clock();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_clock_kind_display() {
        assert_eq!(ClockKind::Wall.to_string(), "wall");
    }
}
