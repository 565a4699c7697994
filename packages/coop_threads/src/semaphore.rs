use std::rc::{Rc, Weak};

use crate::condition::{add_latched_callback, latched_next_action, set_latched};
use crate::dispatch::Dispatch;
use crate::source::upgrade;
use crate::value::Stored;
use crate::{
    Action, Callback, Event, EventSource, ReadableSource, Source, SwitchContext, TaskSwitch,
    WritableSource,
};

/// A counting resource that lets a limited number of waiters proceed.
///
/// The semaphore behaves as a condition that is true while its count is positive, except that
/// becoming true wakes only the first waiter that accepts the event. Being woken does not
/// acquire anything: the woken party must call [`take()`][Self::take] itself, and must
/// [`put()`][Self::put] the resource back when done.
#[derive(Debug)]
pub struct Semaphore {
    stored: Stored,
    this: Weak<Self>,
}

impl Semaphore {
    /// Creates a semaphore holding `count` resources.
    #[must_use]
    pub fn new(count: i64) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            stored: Stored::new(Event::Int(count), Dispatch::FirstAcceptor),
            this: this.clone(),
        })
    }

    /// The number of resources currently available.
    ///
    /// A value that was explicitly set to something other than an integer counts as zero.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.stored.get().as_int().unwrap_or_default()
    }

    /// Makes one more resource available.
    pub fn put(&self) {
        self.set(Event::Int(self.count().saturating_add(1)), false);
    }

    /// Removes one resource.
    pub fn take(&self) {
        self.set(Event::Int(self.count().saturating_sub(1)), false);
    }
}

impl TaskSwitch for Semaphore {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        latched_next_action(&self.stored, self.as_source(), context)
    }

    fn as_event_source(&self) -> Option<Source> {
        Some(self.as_source())
    }
}

impl EventSource for Semaphore {
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

impl ReadableSource for Semaphore {
    fn get(&self) -> Event {
        self.stored.get()
    }
}

impl WritableSource for Semaphore {
    fn set(&self, value: Event, force: bool) {
        set_latched(&self.stored, self.as_source(), value, force);
    }
}
