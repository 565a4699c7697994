use std::any::type_name;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use scopeguard::guard;
use tracing::trace;

use crate::clock::{Clock, ClockFacade};
use crate::source::{suspend_until_fired, upgrade};
use crate::{
    Action, Callback, Condition, Error, Event, EventSource, Frame, Interrupt, ManualClock,
    Result, ScheduledThread, Source, SwitchContext, TaskError, TaskSwitch,
};

/// Cooperative time-driven driver: runs callbacks at requested times on a single thread.
///
/// Nothing happens on its own. The owner of the scheduler calls [`tick()`][Self::tick]
/// repeatedly, typically sleeping for [`time_available()`][Self::time_available] in between,
/// or lets [`run_until()`][Self::run_until] do that. Each tick runs the appointments that are
/// due, in time order, and appointments for the same time in the order they were made.
///
/// Cloning the scheduler gives another handle to the same appointments.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use coop_threads::{EventSource, ManualClock, Scheduler, Yield, task_fn};
///
/// let clock = ManualClock::new();
/// let scheduler = Scheduler::builder().manual_clock(clock.clone()).build();
///
/// let nap = scheduler.sleep(Duration::from_secs(3));
/// let mut slept = false;
/// let thread = scheduler.spawn(task_fn(move |input| {
///     input?;
///     if slept {
///         return Ok(None);
///     }
///     slept = true;
///     Ok(Some(Yield::wait(nap.as_source())))
/// }));
///
/// let finished = thread.is_finished().as_source();
/// scheduler.run_until(&finished).unwrap();
///
/// assert!(thread.finished());
/// assert_eq!(clock.now(), Duration::from_secs(3));
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

struct SchedulerInner {
    clock: ClockFacade,

    // Sorted by time. Appointments for the same time are kept in insertion order.
    appointments: RefCell<VecDeque<Appointment>>,

    is_empty: Rc<Condition>,
}

struct Appointment {
    time: Duration,
    callback: Box<dyn FnOnce(Duration)>,
}

impl Scheduler {
    /// Creates a scheduler that runs on the system clock.
    ///
    /// Use [`Scheduler::builder()`] for custom configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the scheduler.
    #[must_use]
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    fn from_clock(clock: ClockFacade) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                clock,
                appointments: RefCell::new(VecDeque::new()),
                is_empty: Condition::new(true),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_mock(clock: crate::clock::MockClock) -> Self {
        Self::from_clock(ClockFacade::from_mock(clock))
    }

    /// The current time, as an offset from the origin of the scheduler's clock.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    /// Runs `callback` during the first tick at or after `when`.
    ///
    /// The callback receives the time of the tick that runs it.
    pub fn call_at(&self, when: Duration, callback: impl FnOnce(Duration) + 'static) {
        {
            let mut appointments = self.inner.appointments.borrow_mut();
            let index = appointments.partition_point(|appointment| appointment.time <= when);

            appointments.insert(
                index,
                Appointment {
                    time: when,
                    callback: Box::new(callback),
                },
            );

            trace!(?when, index, pending = appointments.len(), "appointment made");
        }

        self.inner.is_empty.set_value(false);
    }

    /// Runs every appointment that was due when the tick started.
    ///
    /// Appointments made while ticking wait for a later tick, even if they are already due, so
    /// a callback that keeps rescheduling itself cannot keep a tick from returning.
    pub fn tick(&self) {
        let now = self.now();

        let due: VecDeque<Appointment> = {
            let mut appointments = self.inner.appointments.borrow_mut();
            let count = appointments.partition_point(|appointment| appointment.time <= now);
            appointments.drain(..count).collect()
        };
        let fired = due.len();

        {
            let mut unrun = guard(due, |unrun| self.restore(unrun));

            while let Some(appointment) = unrun.pop_front() {
                (appointment.callback)(now);
            }
        }

        if fired > 0 {
            trace!(?now, fired, "tick ran appointments");
        }

        let empty = self.inner.appointments.borrow().is_empty();
        self.inner.is_empty.set_value(empty);
    }

    /// Puts back appointments a panicking tick did not get to, ahead of any made since.
    fn restore(&self, unrun: VecDeque<Appointment>) {
        let mut appointments = self.inner.appointments.borrow_mut();

        for appointment in unrun.into_iter().rev() {
            let index = appointments.partition_point(|pending| pending.time < appointment.time);
            appointments.insert(index, appointment);
        }
    }

    /// How long until the earliest pending appointment is due, or `None` if there is none.
    ///
    /// Zero if an appointment is already due.
    #[must_use]
    pub fn time_available(&self) -> Option<Duration> {
        let next = self.inner.appointments.borrow().front()?.time;

        Some(next.saturating_sub(self.now()))
    }

    /// Condition that is true while no appointments are pending.
    ///
    /// It becomes false as soon as an appointment is made, and true again at the end of the
    /// tick that runs the last one.
    #[must_use]
    pub fn is_empty(&self) -> &Rc<Condition> {
        &self.inner.is_empty
    }

    /// An event source that fires `delay` after each callback registration.
    ///
    /// Every wait on the returned sleeper starts a new delay, so the same sleeper can be
    /// waited on again and again.
    #[must_use]
    pub fn sleep(&self, delay: Duration) -> Rc<Sleeper> {
        Rc::new_cyclic(|this| Sleeper {
            scheduler: self.clone(),
            delay,
            this: Weak::clone(this),
        })
    }

    /// Condition that becomes true at `time`.
    #[must_use]
    pub fn until(&self, time: Duration) -> Rc<Condition> {
        if time <= self.now() {
            return Condition::new(true);
        }

        let condition = Condition::new(false);

        let to_set = Rc::clone(&condition);
        self.call_at(time, move |_now| to_set.set_value(true));

        condition
    }

    /// Condition that becomes true `delay` from now.
    #[must_use]
    pub fn timeout(&self, delay: Duration) -> Rc<Condition> {
        self.until(self.now().saturating_add(delay))
    }

    /// Starts a thread that is resumed by this scheduler's ticks.
    ///
    /// The task runs synchronously until it first suspends.
    pub fn spawn(&self, task: impl Into<Frame>) -> ScheduledThread {
        ScheduledThread::start(self.clone(), task.into())
    }

    /// Runs `task`, failing it with [`TaskError::TimedOut`] unless it completes within `delay`.
    ///
    /// Yield the returned interrupt from a thread to run the task there.
    #[must_use]
    pub fn alarm(&self, task: impl Into<Frame>, delay: Duration) -> Rc<Interrupt> {
        Interrupt::with_error(task, self.timeout(delay).as_source(), || TaskError::TimedOut)
    }

    /// Ticks until `source` fires, sleeping on the clock in between, and returns the event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stalled`] if no appointments are left while `source` has not fired.
    pub fn run_until(&self, source: &Source) -> Result<Event> {
        let received = Rc::new(RefCell::new(None));

        let receiver = Rc::clone(&received);
        source.add_callback(Box::new(move |_source, event| {
            *receiver.borrow_mut() = Some(event.clone());
            true
        }));

        loop {
            if let Some(event) = received.borrow_mut().take() {
                return Ok(event);
            }

            let Some(wait) = self.time_available() else {
                return Err(Error::Stalled);
            };

            if !wait.is_zero() {
                self.inner.clock.sleep(wait);
            }

            self.tick();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .inner
            .appointments
            .try_borrow()
            .map(|appointments| appointments.len())
            .ok();

        f.debug_struct(type_name::<Self>())
            .field("clock", &self.inner.clock)
            .field("pending", &pending)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a [`Scheduler`].
#[derive(Debug)]
pub struct SchedulerBuilder {
    clock: Option<ManualClock>,
}

impl SchedulerBuilder {
    fn new() -> Self {
        Self { clock: None }
    }

    /// Runs the scheduler on a manually advanced clock instead of the system clock.
    ///
    /// Default is the system clock.
    #[must_use]
    pub fn manual_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the scheduler with the configured settings.
    #[must_use]
    pub fn build(self) -> Scheduler {
        let clock = self.clock.map_or_else(ClockFacade::system, ClockFacade::from);

        Scheduler::from_clock(clock)
    }
}

/// Event source that fires a fixed delay after each registration, see [`Scheduler::sleep()`].
pub struct Sleeper {
    scheduler: Scheduler,
    delay: Duration,
    this: Weak<Self>,
}

impl Sleeper {
    /// How long after each registration the sleeper fires.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl TaskSwitch for Sleeper {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        suspend_until_fired(self, context)
    }

    fn as_event_source(&self) -> Option<Source> {
        Some(self.as_source())
    }
}

impl EventSource for Sleeper {
    fn add_callback(&self, callback: Callback) {
        let source = self.as_source();
        let when = self.scheduler.now().saturating_add(self.delay);

        self.scheduler.call_at(when, move |now| {
            callback(&source, &Event::Time(now));
        });
    }

    fn as_source(&self) -> Source {
        upgrade(&self.this)
    }
}

impl fmt::Debug for Sleeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
