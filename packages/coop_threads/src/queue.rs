use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::dispatch::{CallbackList, Dispatch};
use crate::source::upgrade;
use crate::{
    Action, Callback, Condition, Error, Event, EventSource, Result, Source, SwitchContext,
    TaskSwitch,
};

/// Buffered event source that hands each item to one reader.
///
/// Every [`put()`][Self::put] appends an item to the buffer and wakes the first waiting reader
/// that accepts it. The woken reader receives the item as its event, but the item stays
/// buffered until a reader takes it with [`pop()`][Self::pop].
///
/// Yielding a queue from a task continues right away if an item is buffered, with the oldest
/// item as the event. Otherwise the thread suspends until the next `put()`.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use coop_threads::{Event, Queue, Thread, Yield, task_fn};
///
/// let jobs = Queue::new();
/// let done = Rc::new(RefCell::new(Vec::new()));
///
/// let source = Rc::clone(&jobs);
/// let sink = Rc::clone(&done);
/// let _worker = Thread::new(task_fn(move |input| {
///     if matches!(input?, Event::Missing) {
///         return Ok(Some(Yield::Switch(source.clone())));
///     }
///     match source.pop() {
///         Ok(Some(job)) => {
///             sink.borrow_mut().push(job);
///             Ok(Some(Yield::Switch(source.clone())))
///         }
///         _ => Ok(None),
///     }
/// }))
/// .unwrap();
///
/// jobs.put("build").unwrap();
/// jobs.put("test").unwrap();
///
/// assert_eq!(*done.borrow(), vec![Event::from("build"), Event::from("test")]);
/// ```
#[derive(Debug)]
pub struct Queue {
    buffer: RefCell<VecDeque<Event>>,
    closed: Cell<bool>,
    readers: CallbackList,
    readers_waiting: Rc<Condition>,
    this: Weak<Self>,
}

impl Queue {
    /// Creates an open queue with nothing buffered.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            buffer: RefCell::new(VecDeque::new()),
            closed: Cell::new(false),
            readers: CallbackList::new(Dispatch::FirstAcceptor),
            readers_waiting: Condition::new(false),
            this: Weak::clone(this),
        })
    }

    /// Buffers `item` and wakes one waiting reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the queue was closed.
    pub fn put(&self, item: impl Into<Event>) -> Result<()> {
        if self.closed.get() {
            return Err(Error::QueueClosed);
        }

        let item = item.into();
        self.buffer.borrow_mut().push_back(item.clone());
        trace!(readers = self.readers.len(), ?item, "queue put");

        self.readers.send(&self.as_source(), &item);
        self.refresh_readers_waiting();

        Ok(())
    }

    /// Takes the oldest buffered item.
    ///
    /// Returns `None` once the queue is closed and drained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueEmpty`] if nothing is buffered but the queue is still open.
    pub fn pop(&self) -> Result<Option<Event>> {
        let item = self.buffer.borrow_mut().pop_front();

        match item {
            Some(item) => {
                self.refresh_readers_waiting();
                Ok(Some(item))
            }
            None if self.closed.get() => Ok(None),
            None => Err(Error::QueueEmpty),
        }
    }

    /// Stops accepting new items. Items already buffered can still be taken.
    pub fn close(&self) {
        self.closed.set(true);
    }

    /// Whether [`close()`][Self::close] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// The number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.borrow().is_empty()
    }

    /// Condition that is true while more readers are waiting than items are buffered.
    #[must_use]
    pub fn readers_waiting(&self) -> &Rc<Condition> {
        &self.readers_waiting
    }

    fn refresh_readers_waiting(&self) {
        let waiting = self.readers.len() > self.len();
        self.readers_waiting.set_value(waiting);
    }
}

impl TaskSwitch for Queue {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        let front = self.buffer.borrow().front().cloned();

        match (front, context) {
            (Some(item), Some(context)) => {
                context.state().yield_event(item);
                Action::Proceed
            }
            (Some(_), None) => Action::Proceed,
            (None, Some(context)) => {
                self.add_callback(context.resume_callback());
                Action::Suspend
            }
            (None, None) => Action::Suspend,
        }
    }

    fn as_event_source(&self) -> Option<Source> {
        Some(self.as_source())
    }
}

impl EventSource for Queue {
    fn add_callback(&self, callback: Callback) {
        self.readers.add(callback);
        self.refresh_readers_waiting();
    }

    fn as_source(&self) -> Source {
        upgrade(&self.this)
    }
}
