use std::any::type_name;
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::panic;
use std::rc::Rc;

use scopeguard::guard;
use tracing::{debug, trace, warn};

use crate::adapt::try_as_switch;
use crate::{
    Action, Callback, Condition, Event, Frame, Scheduler, Source, SwitchContext, TaskError,
    ThreadState,
};

/// A lightweight thread made of suspendable frames, driven by the events it waits for.
///
/// A thread runs its task until the task yields a task switch that suspends it, typically an
/// event source that is not ready yet. The thread continues when the source fires and calls
/// [`step()`][Self::step], and so on until the task is exhausted, at which point
/// [`is_finished()`][Self::is_finished] becomes true.
///
/// Tasks may call nested tasks by yielding [`Yield::Call`][crate::Yield::Call]. A failing frame
/// hands its error to the frame below it. An error that leaves the bottom frame is returned by
/// whichever call stepped the thread: usually [`Thread::new()`] or [`Thread::step()`].
/// [`TaskError::Terminated`] is the exception: it finishes the thread cleanly instead.
///
/// # Panics
///
/// When the step that hits an uncaught error was triggered by an event source, there is no
/// caller to return the error to. The error is then raised as a panic whose payload is the
/// [`TaskError`], out of the call that made the event source fire. Use a
/// [`ScheduledThread`] to have such errors reported through a condition instead.
#[derive(Clone)]
pub struct Thread {
    core: Rc<ThreadCore>,
}

struct ThreadCore {
    state: RefCell<ThreadState>,
    is_finished: Rc<Condition>,
    driver: Driver,

    // Set while the driving loop runs, so that a resumption from inside the loop (e.g. a
    // callback firing synchronously while a task switch registers it) only records its event.
    running: Cell<bool>,
    resumed_while_running: Cell<bool>,
}

enum Driver {
    Immediate,
    Scheduled {
        scheduler: Scheduler,
        aborted: Rc<Condition>,
        failure: Rc<RefCell<Option<TaskError>>>,
    },
}

impl Thread {
    /// Starts a thread running `task` and runs it until it first suspends.
    ///
    /// # Errors
    ///
    /// Returns the error that escaped the task, if it failed before first suspending.
    pub fn new(task: impl Into<Frame>) -> Result<Self, TaskError> {
        let thread = Self::with_driver(task.into(), Driver::Immediate);
        thread.drive(Event::Missing)?;

        Ok(thread)
    }

    fn with_driver(frame: Frame, driver: Driver) -> Self {
        let mut state = ThreadState::new();
        state.call(frame);

        Self {
            core: Rc::new(ThreadCore {
                state: RefCell::new(state),
                is_finished: Condition::new(false),
                driver,
                running: Cell::new(false),
                resumed_while_running: Cell::new(false),
            }),
        }
    }

    /// Resumes the thread with `event` and runs it until it suspends again or finishes.
    ///
    /// The running frame receives `event` as its input. Threads spawned by a [`Scheduler`] do not
    /// run here; they are queued to run during the scheduler's next
    /// [`tick()`][Scheduler::tick].
    ///
    /// # Errors
    ///
    /// Returns the error that escaped the task, if it failed during this step.
    pub fn step(&self, source: Option<&Source>, event: Event) -> Result<(), TaskError> {
        trace!(from_source = source.is_some(), ?event, "thread stepped");

        match &self.core.driver {
            Driver::Immediate => self.drive(event),
            Driver::Scheduled { scheduler, .. } => {
                let thread = self.clone();
                scheduler.call_at(scheduler.now(), move |_now| {
                    reraise(thread.drive(event));
                });

                Ok(())
            }
        }
    }

    /// Condition that becomes true when the thread has completed.
    #[must_use]
    pub fn is_finished(&self) -> &Rc<Condition> {
        &self.core.is_finished
    }

    /// Whether the thread has completed.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.core.is_finished.is_true()
    }

    /// A callback that resumes this thread with the event it is invoked with.
    ///
    /// The callback accepts every event it receives.
    #[must_use]
    pub fn resume_callback(&self) -> Callback {
        let thread = self.clone();

        Box::new(move |source, event| {
            reraise(thread.step(Some(source), event.clone()));
            true
        })
    }

    /// Raises `error` in the running frame and resumes the thread with `event`.
    pub(crate) fn interrupt(&self, error: TaskError, source: &Source, event: &Event) {
        self.state_mut().call(Frame::failing(error));
        reraise(self.step(Some(source), event.clone()));
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, ThreadState> {
        self.core.state.borrow_mut()
    }

    fn drive(&self, event: Event) -> Result<(), TaskError> {
        match self.run(event) {
            None => Ok(()),
            Some(error) => self.uncaught_error(error),
        }
    }

    /// The driving loop. Returns the error that escaped the bottom frame, if any.
    fn run(&self, event: Event) -> Option<TaskError> {
        let core = &*self.core;

        {
            let mut state = core.state.borrow_mut();
            if state.is_empty() {
                // Finished or failed already; late events have nothing to resume.
                return None;
            }

            state.yield_event(event);
        }

        if core.running.replace(true) {
            core.resumed_while_running.set(true);
            return None;
        }

        let _running = guard((), |()| core.running.set(false));

        loop {
            let Some((mut frame, input)) = core.state.borrow_mut().take_top() else {
                break;
            };

            match frame.advance(input) {
                Err(error) => {
                    let mut state = core.state.borrow_mut();
                    state.throw(error);

                    if state.is_empty() {
                        return state.take_error();
                    }
                }
                Ok(None) => core.state.borrow_mut().catch(),
                Ok(Some(produced)) => {
                    {
                        let mut state = core.state.borrow_mut();
                        state.call(frame);
                        state.catch();
                    }

                    match try_as_switch(produced) {
                        Ok(switch) => {
                            core.resumed_while_running.set(false);

                            let action = switch.next_action(Some(SwitchContext::new(self)));

                            if action == Action::Suspend && !core.resumed_while_running.get() {
                                trace!(depth = core.state.borrow().depth(), "thread suspended");
                                return None;
                            }
                        }
                        Err(value) => core.state.borrow_mut().yield_event(value),
                    }
                }
            }
        }

        trace!("thread finished");
        core.is_finished.set_value(true);
        None
    }

    fn uncaught_error(&self, error: TaskError) -> Result<(), TaskError> {
        match &self.core.driver {
            Driver::Immediate => {
                if error.is_termination() {
                    debug!("thread terminated");
                    self.core.is_finished.set_value(true);
                    Ok(())
                } else {
                    debug!(%error, "uncaught error in thread");
                    Err(error)
                }
            }
            Driver::Scheduled {
                scheduler,
                aborted,
                failure,
            } => {
                let condition = if error.is_termination() {
                    debug!("spawned thread terminated");
                    Rc::clone(&self.core.is_finished)
                } else {
                    warn!(%error, "spawned thread aborted");
                    *failure.borrow_mut() = Some(error);
                    Rc::clone(aborted)
                };

                scheduler.call_at(scheduler.now(), move |_now| condition.set_value(true));
                Ok(())
            }
        }
    }
}

/// Raises an uncaught task error out of a context that cannot return it.
fn reraise(result: Result<(), TaskError>) {
    if let Err(error) = result {
        warn!(%error, "uncaught task error raised out of an event callback");
        panic::panic_any(error);
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self.core.state.try_borrow().map(|state| state.depth()).ok();

        f.debug_struct(type_name::<Self>())
            .field("depth", &depth)
            .field("finished", &self.finished())
            .field("scheduled", &matches!(self.core.driver, Driver::Scheduled { .. }))
            .finish_non_exhaustive()
    }
}

/// A [`Thread`] that runs only when its [`Scheduler`] ticks.
///
/// Stepping a scheduled thread queues the step for the scheduler's next
/// [`tick()`][Scheduler::tick] instead of running it, so a scheduled thread never runs inside
/// whatever code caused an event to fire, and can never raise errors there. An uncaught error
/// aborts the thread: during the next tick [`aborted()`][Self::aborted] becomes true and the
/// error is kept for [`take_error()`][Self::take_error]. [`TaskError::Terminated`] finishes the
/// thread instead.
///
/// Note that when a scheduled thread resumes, other code may already have run since the event
/// it waited for fired, so whatever condition it waited for may no longer hold.
///
/// Created by [`Scheduler::spawn()`].
#[derive(Clone)]
pub struct ScheduledThread {
    thread: Thread,
    aborted: Rc<Condition>,
    failure: Rc<RefCell<Option<TaskError>>>,
}

impl ScheduledThread {
    /// Starts the thread, running it until it first suspends.
    pub(crate) fn start(scheduler: Scheduler, frame: Frame) -> Self {
        let aborted = Condition::new(false);
        let failure = Rc::new(RefCell::new(None));

        let thread = Thread::with_driver(
            frame,
            Driver::Scheduled {
                scheduler,
                aborted: Rc::clone(&aborted),
                failure: Rc::clone(&failure),
            },
        );
        reraise(thread.drive(Event::Missing));

        Self {
            thread,
            aborted,
            failure,
        }
    }

    /// Queues the thread to resume with `event` during the scheduler's next tick.
    pub fn step(&self, source: Option<&Source>, event: Event) {
        reraise(self.thread.step(source, event));
    }

    /// Condition that becomes true when the thread has completed.
    #[must_use]
    pub fn is_finished(&self) -> &Rc<Condition> {
        self.thread.is_finished()
    }

    /// Whether the thread has completed.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.thread.finished()
    }

    /// Condition that becomes true when the thread was aborted by an uncaught error.
    #[must_use]
    pub fn aborted(&self) -> &Rc<Condition> {
        &self.aborted
    }

    /// Whether the thread was aborted by an uncaught error.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_true()
    }

    /// Takes the error that aborted the thread.
    #[must_use]
    pub fn take_error(&self) -> Option<TaskError> {
        self.failure.borrow_mut().take()
    }

    /// The underlying thread.
    #[must_use]
    pub fn thread(&self) -> &Thread {
        &self.thread
    }
}

impl fmt::Debug for ScheduledThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("thread", &self.thread)
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}
