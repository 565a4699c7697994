use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use scopeguard::guard;
use tracing::warn;

use crate::{Callback, Event, Source};

/// Ongoing delivery of every firing of an event source to one callback.
///
/// Plain callbacks are delivered at most once per registration. A subscription re-registers
/// itself after every delivery, until it is [paused][Self::pause]. Pausing does not unregister
/// anything: a firing that arrives while paused is swallowed, and
/// [`resume()`][Self::resume] registers again if needed.
///
/// Dropping the handle does not end the subscription; it only ends when paused.
///
/// Subscribing to a latched source that is already ready, such as a true [`Condition`] or a
/// [`Semaphore`] with a positive count, delivers once right away. After that the subscription
/// waits for the source to fire again, which for a condition means becoming true again.
///
/// [`Condition`]: crate::Condition
/// [`Semaphore`]: crate::Semaphore
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use coop_threads::{EventSource, Value};
///
/// let value = Value::new(0);
/// let seen = Rc::new(Cell::new(0));
///
/// let seen_clone = Rc::clone(&seen);
/// let subscription = value.add_subscriber(Box::new(move |_source, _event| {
///     seen_clone.set(seen_clone.get() + 1);
/// }));
///
/// value.set_value(1);
/// value.set_value(2);
/// assert_eq!(seen.get(), 2);
///
/// subscription.pause();
/// value.set_value(3);
/// assert_eq!(seen.get(), 2);
/// ```
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

struct SubscriptionInner {
    source: Source,
    callback: RefCell<Box<dyn FnMut(&Source, &Event)>>,
    active: Cell<bool>,
    subscribed: Cell<bool>,
    delivering: Cell<bool>,
}

impl Subscription {
    /// Subscribes `callback` to `source` until paused.
    #[must_use]
    pub fn new(source: Source, callback: Box<dyn FnMut(&Source, &Event)>) -> Self {
        let inner = Rc::new(SubscriptionInner {
            source,
            callback: RefCell::new(callback),
            active: Cell::new(true),
            subscribed: Cell::new(false),
            delivering: Cell::new(false),
        });

        SubscriptionInner::register(&inner, Registration::Current);

        Self { inner }
    }

    /// Stops delivering events until resumed.
    pub fn pause(&self) {
        self.inner.active.set(false);
    }

    /// Delivers events again after a pause.
    pub fn resume(&self) {
        self.inner.active.set(true);

        if !self.inner.subscribed.get() {
            SubscriptionInner::register(&self.inner, Registration::Current);
        }
    }

    /// Whether events are currently delivered, i.e. the subscription is not paused.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }
}

/// How a subscription registers with its source.
#[derive(Clone, Copy)]
enum Registration {
    /// Delivered right away if the source is ready now.
    Current,

    /// Delivered the next time the source fires.
    Next,
}

impl SubscriptionInner {
    fn register(this: &Rc<Self>, registration: Registration) {
        this.subscribed.set(true);

        let registered = Rc::clone(this);
        let callback: Callback = Box::new(move |source, event| registered.deliver(source, event));

        match registration {
            Registration::Current => this.source.add_callback(callback),
            Registration::Next => this.source.add_next_callback(callback),
        }
    }

    fn deliver(self: Rc<Self>, source: &Source, event: &Event) -> bool {
        self.subscribed.set(false);

        // A registration made during delivery fired right away. Declining it leaves the
        // subscription unregistered, for the delivery in progress to register again.
        if !self.active.get() || self.delivering.get() {
            return false;
        }

        {
            self.delivering.set(true);
            let _delivering = guard(&self.delivering, |delivering| delivering.set(false));

            {
                let mut callback = self.callback.borrow_mut();
                (*callback)(source, event);
            }

            // The callback may have paused and resumed us, which already registered again.
            if self.active.get() && !self.subscribed.get() {
                Self::register(&self, Registration::Next);

                if !self.subscribed.get() {
                    warn!(
                        ?source,
                        "source fired again while the subscription re-registered, \
                         subscription stalls until resumed"
                    );
                }
            }
        }

        true
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("source", &self.inner.source)
            .field("active", &self.inner.active.get())
            .field("subscribed", &self.inner.subscribed.get())
            .finish_non_exhaustive()
    }
}
