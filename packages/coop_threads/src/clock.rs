use std::any::type_name;
use std::cell::Cell;
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Time as seen by a [`Scheduler`][crate::Scheduler]: an offset from an arbitrary origin.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Clock: Debug {
    fn now(&self) -> Duration;

    /// Blocks until `duration` has passed, as far as this clock is concerned.
    fn sleep(&self, duration: Duration);
}

/// Wall clock time, measured from when the clock was created.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time. Sleeping on a manual clock advances it instead of blocking, so a
/// scheduler running on one processes its appointments as fast as it can.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use coop_threads::{ManualClock, Scheduler};
///
/// let clock = ManualClock::new();
/// let scheduler = Scheduler::builder().manual_clock(clock.clone()).build();
///
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(scheduler.now(), Duration::from_secs(5));
/// ```
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Creates a clock that reads zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The time the clock reads.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get().saturating_add(duration));
    }

    /// Moves the clock to `time`. The clock never moves backwards, so earlier times are ignored.
    pub fn set(&self, time: Duration) {
        self.now.set(self.now.get().max(time));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Self::now(self)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

impl Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("now", &self.now.get())
            .finish()
    }
}

/// The clock a scheduler runs on.
#[derive(Clone)]
pub(crate) enum ClockFacade {
    System(SystemClock),
    Manual(ManualClock),

    #[cfg(test)]
    Mock(Rc<MockClock>),
}

impl ClockFacade {
    pub(crate) fn system() -> Self {
        Self::System(SystemClock::new())
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockClock) -> Self {
        Self::Mock(Rc::new(mock))
    }
}

impl Clock for ClockFacade {
    fn now(&self) -> Duration {
        match self {
            Self::System(clock) => clock.now(),
            Self::Manual(clock) => Clock::now(clock),
            #[cfg(test)]
            Self::Mock(clock) => clock.now(),
        }
    }

    fn sleep(&self, duration: Duration) {
        match self {
            Self::System(clock) => clock.sleep(duration),
            Self::Manual(clock) => clock.sleep(duration),
            #[cfg(test)]
            Self::Mock(clock) => clock.sleep(duration),
        }
    }
}

impl From<ManualClock> for ClockFacade {
    fn from(clock: ManualClock) -> Self {
        Self::Manual(clock)
    }
}

impl Debug for ClockFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System(clock) => clock.fmt(f),
            Self::Manual(clock) => clock.fmt(f),
            #[cfg(test)]
            Self::Mock(clock) => clock.fmt(f),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(ManualClock: Send, Sync);

    #[test]
    fn manual_clock_moves_only_forward() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(10));
        clock.set(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(10));

        clock.set(Duration::from_millis(30));
        assert_eq!(clock.now(), Duration::from_millis(30));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let facade = ClockFacade::from(clock.clone());

        facade.sleep(Duration::from_secs(2));

        assert_eq!(clock.now(), Duration::from_secs(2));
        assert_eq!(facade.now(), Duration::from_secs(2));
    }

    #[test]
    fn system_clock_starts_near_zero() {
        let clock = ClockFacade::system();

        assert!(clock.now() < Duration::from_secs(60));
    }

    #[test]
    fn facade_forwards_to_mock() {
        let mut mock = MockClock::new();
        mock.expect_now().return_const(Duration::from_secs(7));
        mock.expect_sleep()
            .withf(|duration| *duration == Duration::from_secs(1))
            .times(1)
            .return_const(());

        let clock = ClockFacade::from_mock(mock);

        assert_eq!(clock.now(), Duration::from_secs(7));
        clock.sleep(Duration::from_secs(1));
    }
}
