use std::rc::{Rc, Weak};

use tracing::trace;

use crate::dispatch::{CallbackList, Dispatch};
use crate::source::{suspend_until_fired, upgrade};
use crate::{Action, Callback, Event, EventSource, Source, SwitchContext, TaskSwitch};

/// Event source that hands each event to the first callback willing to accept it.
///
/// Callbacks are offered events in the order they were registered. Like every callback, one
/// that declines an event is used up: it is dropped and the event moves on to the next
/// callback. Yielding a distributor from a task always suspends the thread until the next
/// [`send()`][Self::send].
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use coop_threads::{Distributor, Event, EventSource};
///
/// let jobs = Distributor::new();
/// let taken = Rc::new(Cell::new(0));
///
/// for _ in 0..2 {
///     let taken = Rc::clone(&taken);
///     jobs.add_callback(Box::new(move |_source, _event| {
///         taken.set(taken.get() + 1);
///         true
///     }));
/// }
///
/// jobs.send(Event::from("first job"));
/// assert_eq!(taken.get(), 1);
/// ```
#[derive(Debug)]
pub struct Distributor {
    callbacks: CallbackList,
    this: Weak<Self>,
}

impl Distributor {
    /// Creates a distributor with no callbacks.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            callbacks: CallbackList::new(Dispatch::FirstAcceptor),
            this: this.clone(),
        })
    }

    /// Offers `event` to the registered callbacks until one accepts it.
    pub fn send(&self, event: impl Into<Event>) {
        let event = event.into();
        trace!(waiting = self.callbacks.len(), ?event, "distributor send");

        self.callbacks.send(&self.as_source(), &event);
    }
}

impl TaskSwitch for Distributor {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        suspend_until_fired(self, context)
    }

    fn as_event_source(&self) -> Option<Source> {
        Some(self.as_source())
    }
}

impl EventSource for Distributor {
    fn add_callback(&self, callback: Callback) {
        self.callbacks.add(callback);
    }

    fn as_source(&self) -> Source {
        upgrade(&self.this)
    }
}
