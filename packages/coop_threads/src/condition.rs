use std::rc::{Rc, Weak};

use crate::dispatch::Dispatch;
use crate::source::upgrade;
use crate::value::Stored;
use crate::{
    Action, Callback, Event, EventSource, ReadableSource, Source, SwitchContext, TaskSwitch,
    WritableSource,
};

/// A latch that lets waiters through while its value is true.
///
/// Callbacks added while the condition is true are called immediately instead of being
/// registered. Callbacks registered while it is false fire when it becomes true. Changing a true
/// condition to another true value, or to false, is not observable by waiters.
///
/// A task that yields a true condition continues without suspending and receives the current
/// value; yielding a false condition suspends the thread until the condition becomes true.
///
/// # Example
///
/// ```rust
/// use coop_threads::{Condition, Thread, Yield, task_fn};
///
/// let ready = Condition::new(false);
///
/// let waiting_for = ready.clone();
/// let mut waited = false;
/// let thread = Thread::new(task_fn(move |_input| {
///     if waited {
///         return Ok(None);
///     }
///     waited = true;
///     Ok(Some(Yield::Switch(waiting_for.clone())))
/// }))
/// .unwrap();
///
/// assert!(!thread.finished());
/// ready.set_value(true);
/// assert!(thread.finished());
/// ```
#[derive(Debug)]
pub struct Condition {
    stored: Stored,
    this: Weak<Self>,
}

impl Condition {
    /// Creates a condition holding `value`.
    #[must_use]
    pub fn new(value: impl Into<Event>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            stored: Stored::new(value.into(), Dispatch::Broadcast),
            this: this.clone(),
        })
    }

    /// Whether the condition is currently true.
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.stored.is_truthy()
    }

    /// Changes the value, waking the waiters if the condition became true.
    pub fn set_value(&self, value: impl Into<Event>) {
        self.set(value.into(), false);
    }
}

/// Registration, firing and task switching shared by [`Condition`] and
/// [`Semaphore`][crate::Semaphore].
pub(crate) fn add_latched_callback(stored: &Stored, source: Source, callback: Callback) {
    if stored.is_truthy() {
        callback(&source, &stored.get());
    } else {
        stored.callbacks.add(callback);
    }
}

pub(crate) fn set_latched(stored: &Stored, source: Source, value: Event, force: bool) {
    let was_true = stored.replace(value.clone()).is_truthy();

    if force || (!was_true && value.is_truthy()) {
        stored.callbacks.send(&source, &value);
    }
}

pub(crate) fn latched_next_action(
    stored: &Stored,
    source: Source,
    context: Option<SwitchContext<'_>>,
) -> Action {
    if stored.is_truthy() {
        if let Some(context) = context {
            context.state().yield_event(stored.get());
        }

        Action::Proceed
    } else {
        if let Some(context) = context {
            add_latched_callback(stored, source, context.resume_callback());
        }

        Action::Suspend
    }
}

impl TaskSwitch for Condition {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        latched_next_action(&self.stored, self.as_source(), context)
    }

    fn as_event_source(&self) -> Option<Source> {
        Some(self.as_source())
    }
}

impl EventSource for Condition {
    fn add_callback(&self, callback: Callback) {
        add_latched_callback(&self.stored, self.as_source(), callback);
    }

    fn add_next_callback(&self, callback: Callback) {
        self.stored.callbacks.add(callback);
    }

    fn as_source(&self) -> Source {
        upgrade(&self.this)
    }
}

impl ReadableSource for Condition {
    fn get(&self) -> Event {
        self.stored.get()
    }
}

impl WritableSource for Condition {
    fn set(&self, value: Event, force: bool) {
        set_latched(&self.stored, self.as_source(), value, force);
    }
}
