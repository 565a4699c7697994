use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::adapt::try_as_source;
use crate::source::upgrade;
use crate::{
    Action, Callback, Error, Event, EventSource, Result, Source, SwitchContext, TaskSwitch, Yield,
};

/// Event source that fires when the first of several sources fires.
///
/// Each registered callback is delivered to at most once, no matter how many of the underlying
/// sources fire afterwards. The event it receives is [`Event::From`], naming the underlying
/// source that fired and carrying the event that source delivered.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use coop_threads::{AnyOf, Event, EventSource, Value};
///
/// let a = Value::new(0);
/// let b = Value::new(0);
/// let either = AnyOf::new([a.as_source(), b.as_source()]).unwrap();
///
/// let received = Rc::new(RefCell::new(None));
/// let receiver = Rc::clone(&received);
/// either.add_callback(Box::new(move |_source, event| {
///     *receiver.borrow_mut() = Some(event.clone());
///     true
/// }));
///
/// b.set_value(1);
/// a.set_value(2);
///
/// let received = received.borrow_mut().take().unwrap();
/// assert!(Rc::ptr_eq(received.source().unwrap(), &b.as_source()));
/// assert_eq!(received.unmerged(), &Event::from(1));
/// ```
#[derive(Debug)]
pub struct AnyOf {
    sources: Vec<Source>,
    this: Weak<Self>,
}

impl AnyOf {
    /// Combines `sources` into one.
    ///
    /// A single source is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSources`] if `sources` is empty.
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Result<Source> {
        let mut sources: Vec<Source> = sources.into_iter().collect();

        match sources.len() {
            0 => Err(Error::NoSources),
            1 => Ok(sources.swap_remove(0)),
            _ => Ok(Rc::new_cyclic(|this| Self {
                sources,
                this: Weak::clone(this),
            })),
        }
    }

    /// Combines values produced by tasks into one source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAnEventSource`] if any of the values is not an event source, and
    /// [`Error::NoSources`] if there are no values.
    pub fn adapt(values: impl IntoIterator<Item = Yield>) -> Result<Source> {
        let sources = values
            .into_iter()
            .map(|value| {
                try_as_source(&value).ok_or_else(|| Error::NotAnEventSource {
                    description: format!("{value:?}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(sources)
    }

    /// The sources this combines.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }
}

impl TaskSwitch for AnyOf {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        let ready = self
            .sources
            .iter()
            .find(|source| source.next_action(None) == Action::Proceed);

        if let Some(source) = ready {
            if let Some(context) = context {
                let action = source.next_action(Some(context));

                let mut state = context.state();
                let event = Event::merged(Rc::clone(source), state.last_event().clone());
                state.yield_event(event);

                return action;
            }

            return Action::Proceed;
        }

        if let Some(context) = context {
            self.add_callback(context.resume_callback());
        }

        Action::Suspend
    }

    fn as_event_source(&self) -> Option<Source> {
        Some(self.as_source())
    }
}

impl EventSource for AnyOf {
    fn add_callback(&self, callback: Callback) {
        self.register(callback, |source, wrapper| source.add_callback(wrapper));
    }

    fn add_next_callback(&self, callback: Callback) {
        self.register(callback, |source, wrapper| source.add_next_callback(wrapper));
    }

    fn as_source(&self) -> Source {
        upgrade(&self.this)
    }
}

impl AnyOf {
    /// Registers a wrapper around `callback` with every source, using `add` to do so.
    fn register(&self, callback: Callback, add: impl Fn(&Source, Callback)) {
        let this = self.as_source();

        // Shared by the wrappers on every source; whichever fires first takes the callback.
        let unfired = Rc::new(RefCell::new(Some(callback)));

        for source in &self.sources {
            let this = Rc::clone(&this);
            let unfired = Rc::clone(&unfired);

            add(
                source,
                Box::new(move |fired, event| {
                    let callback = unfired.borrow_mut().take();

                    match callback {
                        Some(callback) => {
                            trace!(?event, "any-of source fired");
                            callback(&this, &Event::merged(Rc::clone(fired), event.clone()))
                        }
                        None => false,
                    }
                }),
            );
        }
    }
}
