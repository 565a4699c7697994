use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::dispatch::{CallbackList, Dispatch};
use crate::source::{suspend_until_fired, upgrade};
use crate::{
    Action, Callback, Event, EventSource, Queue, ReadableSource, Source, SwitchContext,
    TaskSwitch, WritableSource,
};

/// Storage shared by the sources that hold a current value.
#[derive(Debug)]
pub(crate) struct Stored {
    value: RefCell<Event>,
    pub(crate) callbacks: CallbackList,
}

impl Stored {
    pub(crate) fn new(value: Event, dispatch: Dispatch) -> Self {
        Self {
            value: RefCell::new(value),
            callbacks: CallbackList::new(dispatch),
        }
    }

    pub(crate) fn get(&self) -> Event {
        self.value.borrow().clone()
    }

    pub(crate) fn is_truthy(&self) -> bool {
        self.value.borrow().is_truthy()
    }

    /// Stores `value`, returning the previous one.
    pub(crate) fn replace(&self, value: Event) -> Event {
        mem::replace(&mut *self.value.borrow_mut(), value)
    }
}

/// A variable that notifies every registered callback when it changes.
///
/// Yielding a value from a task suspends the thread until the next time the value fires;
/// the task resumes with the new value.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use coop_threads::{Event, EventSource, ReadableSource, Value};
///
/// let temperature = Value::new(20);
/// let changes = Rc::new(Cell::new(0));
///
/// let changes_clone = Rc::clone(&changes);
/// temperature.add_callback(Box::new(move |_source, _event| {
///     changes_clone.set(changes_clone.get() + 1);
///     true
/// }));
///
/// temperature.set_value(20); // No change, no notification.
/// temperature.set_value(21);
///
/// assert_eq!(changes.get(), 1);
/// assert_eq!(temperature.get(), Event::from(21));
/// ```
#[derive(Debug)]
pub struct Value {
    stored: Stored,
    this: Weak<Self>,
}

impl Value {
    /// Creates a value source holding `value`.
    #[must_use]
    pub fn new(value: impl Into<Event>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            stored: Stored::new(value.into(), Dispatch::Broadcast),
            this: this.clone(),
        })
    }

    /// Changes the value, notifying the callbacks if it is different from before.
    pub fn set_value(&self, value: impl Into<Event>) {
        self.set(value.into(), false);
    }

    /// A queue that receives every later change of this value.
    ///
    /// The queue only holds on to the changes while it is alive; changes made after it is
    /// dropped or closed are discarded.
    #[must_use]
    pub fn as_queue(&self) -> Rc<Queue> {
        let queue = Queue::new();

        let target = Rc::downgrade(&queue);
        self.add_subscriber(Box::new(move |_source, event| {
            let Some(queue) = target.upgrade() else {
                return;
            };

            if let Err(error) = queue.put(event.clone()) {
                debug!(%error, "value change not queued");
            }
        }));

        queue
    }
}

impl TaskSwitch for Value {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        suspend_until_fired(self, context)
    }

    fn as_event_source(&self) -> Option<Source> {
        Some(self.as_source())
    }
}

impl EventSource for Value {
    fn add_callback(&self, callback: Callback) {
        self.stored.callbacks.add(callback);
    }

    fn as_source(&self) -> Source {
        upgrade(&self.this)
    }
}

impl ReadableSource for Value {
    fn get(&self) -> Event {
        self.stored.get()
    }
}

impl WritableSource for Value {
    fn set(&self, value: Event, force: bool) {
        let previous = self.stored.replace(value.clone());

        if force || previous != value {
            self.stored.callbacks.send(&self.as_source(), &value);
        }
    }
}
