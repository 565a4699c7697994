use std::cell::RefMut;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::{Event, Subscription, Thread, ThreadState};

/// Shared handle to any event source.
pub type Source = Rc<dyn EventSource>;

/// A one-shot callback registered with an event source.
///
/// The callback receives the source that fired and the event it delivered. Returning `true`
/// accepts ("consumes") the event, which stops first-acceptor dispatch. Returning `false`
/// declines it, letting the next callback in line see the same event.
///
/// Callbacks must not panic. Event sources do not guarantee that the remaining callbacks
/// of a dispatch run if one of them does.
pub type Callback = Box<dyn FnOnce(&Source, &Event) -> bool>;

/// What a thread should do after consulting a [`TaskSwitch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Action {
    /// Keep running the thread without giving up control.
    Proceed,

    /// Suspend the thread. The task switch has arranged for the thread to be stepped again
    /// once whatever it waits for has happened.
    Suspend,
}

/// The running thread a [`TaskSwitch`] is consulted on behalf of.
#[derive(Clone, Copy, Debug)]
pub struct SwitchContext<'a> {
    thread: &'a Thread,
}

impl<'a> SwitchContext<'a> {
    pub(crate) fn new(thread: &'a Thread) -> Self {
        Self { thread }
    }

    /// The thread that consults the task switch.
    #[must_use]
    pub fn thread(&self) -> &'a Thread {
        self.thread
    }

    /// Mutable access to the state of the thread.
    ///
    /// The guard must be dropped before registering callbacks on any event source, as a
    /// callback that fires synchronously may need the state itself.
    #[must_use]
    pub fn state(&self) -> RefMut<'a, ThreadState> {
        self.thread.state_mut()
    }

    /// A callback that resumes the thread with the event it is invoked with.
    #[must_use]
    pub fn resume_callback(&self) -> Callback {
        self.thread.resume_callback()
    }
}

/// Something a task can yield to a thread in order to control the flow of the thread.
pub trait TaskSwitch: Debug {
    /// Decides whether the thread may continue.
    ///
    /// Without a context this is a side-effect-free probe: [`Action::Proceed`] means the switch
    /// is satisfied right now.
    ///
    /// With a context the switch acts on the thread: it may record an event for the running
    /// task via [`ThreadState::yield_event`], push a nested frame via [`ThreadState::call`], or
    /// register [`SwitchContext::resume_callback`] somewhere and return [`Action::Suspend`].
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action;

    /// The event source capability of this switch, if it has one.
    fn as_event_source(&self) -> Option<Source> {
        None
    }
}

/// A task switch that callbacks can also be registered with.
pub trait EventSource: TaskSwitch {
    /// Arranges for `callback` to be called the next time this source fires.
    ///
    /// A callback registered while the source is dispatching is not invoked until the
    /// source fires again. Each registration is delivered at most once.
    fn add_callback(&self, callback: Callback);

    /// Like [`add_callback()`][Self::add_callback], but ignores the state the source is in now.
    ///
    /// A latched source that is already ready calls an ordinary callback back right away. A
    /// callback added here instead waits until the source fires again. For sources without a
    /// latched state this is the same as `add_callback()`.
    fn add_next_callback(&self, callback: Callback) {
        self.add_callback(callback);
    }

    /// A shared handle to this source.
    fn as_source(&self) -> Source;

    /// Subscribes `callback` to every future firing of this source until paused.
    fn add_subscriber(&self, callback: Box<dyn FnMut(&Source, &Event)>) -> Subscription {
        Subscription::new(self.as_source(), callback)
    }
}

/// A source whose current value or state can be read.
pub trait ReadableSource: EventSource {
    /// The current value of the source.
    fn get(&self) -> Event;
}

/// A readable source whose value can also be changed.
pub trait WritableSource: ReadableSource {
    /// Replaces the current value, possibly firing the source.
    ///
    /// With `force`, the source fires even if it would not have done so because the value did
    /// not change. Firing may still be suppressed for reasons specific to the source type.
    fn set(&self, value: Event, force: bool);
}

/// Upgrades the self-reference every event source keeps to hand itself out to callbacks.
pub(crate) fn upgrade<S>(this: &Weak<S>) -> Source
where
    S: EventSource + 'static,
{
    this.upgrade()
        .expect("event sources are only ever reachable through the Rc that owns them")
}

/// The behavior of sources that suspend a thread until they next fire.
pub(crate) fn suspend_until_fired(
    source: &dyn EventSource,
    context: Option<SwitchContext<'_>>,
) -> Action {
    if let Some(context) = context {
        source.add_callback(context.resume_callback());
    }

    Action::Suspend
}
