use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::{Action, Frame, Source, SwitchContext, TaskError, TaskSwitch, Yield, task_fn};

/// Runs a nested task unless an event source fires first.
///
/// Yielding an interrupt from a task runs the wrapped task as a nested call. If the guarding
/// source fires before the nested task exits, the nested task is failed with the interrupt's
/// error, [`TaskError::Interrupted`] unless configured otherwise. The calling frame observes
/// either the nested task's result or that error.
///
/// An interrupt runs its task only once. Yielding it again does nothing.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use coop_threads::{Distributor, EventSource, Interrupt, TaskError, Thread, Yield, task_fn};
///
/// let never_sent = Distributor::new();
/// let cancel = Distributor::new();
///
/// let mut waiting = false;
/// let stuck = task_fn(move |input| {
///     input?;
///     if waiting {
///         return Ok(None);
///     }
///     waiting = true;
///     Ok(Some(Yield::wait(never_sent.as_source())))
/// });
/// let interrupt = Interrupt::new(stuck, cancel.as_source());
///
/// let outcome = Rc::new(RefCell::new(None));
/// let outcome_clone = Rc::clone(&outcome);
/// let mut started = false;
/// let thread = Thread::new(task_fn(move |input| {
///     if started {
///         *outcome_clone.borrow_mut() = Some(input);
///         return Ok(None);
///     }
///     started = true;
///     Ok(Some(Yield::Switch(interrupt.clone())))
/// }))
/// .unwrap();
///
/// cancel.send("stop");
///
/// assert!(thread.finished());
/// assert!(matches!(*outcome.borrow(), Some(Err(TaskError::Interrupted))));
/// ```
pub struct Interrupt {
    task: RefCell<Option<Frame>>,
    source: Source,
    error: Rc<dyn Fn() -> TaskError>,
}

impl Interrupt {
    /// Runs `task`, interrupting it with [`TaskError::Interrupted`] if `source` fires first.
    #[must_use]
    pub fn new(task: impl Into<Frame>, source: Source) -> Rc<Self> {
        Self::with_error(task, source, || TaskError::Interrupted)
    }

    /// Runs `task`, interrupting it with the error returned by `error` if `source` fires first.
    #[must_use]
    pub fn with_error(
        task: impl Into<Frame>,
        source: Source,
        error: impl Fn() -> TaskError + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            task: RefCell::new(Some(task.into())),
            source,
            error: Rc::new(error),
        })
    }

    /// Whether the task was already started.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.task.borrow().is_none()
    }
}

impl TaskSwitch for Interrupt {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        let Some(context) = context else {
            return Action::Proceed;
        };

        let Some(task) = self.task.borrow_mut().take() else {
            warn!("interrupt was already used and cannot run its task again");
            return Action::Proceed;
        };

        // Set once the nested task has exited, after which the source no longer matters.
        let done = Rc::new(Cell::new(false));

        let mut nested = Some(task);
        let exited = Rc::clone(&done);
        context.state().call(Frame::task(task_fn(move |input| {
            if let Some(task) = nested.take() {
                input?;
                return Ok(Some(Yield::Call(task)));
            }

            exited.set(true);
            input?;
            Ok(None)
        })));

        let thread = context.thread().clone();
        let error = Rc::clone(&self.error);
        self.source.add_callback(Box::new(move |source, event| {
            if done.replace(true) {
                return false;
            }

            let error = error();
            debug!(%error, "interrupting nested task");
            thread.interrupt(error, source, event);
            true
        }));

        Action::Proceed
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("source", &self.source)
            .field("spent", &self.is_spent())
            .finish_non_exhaustive()
    }
}
