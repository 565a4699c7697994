use std::any::type_name;
use std::fmt;
use std::rc::Rc;

use crate::{Event, Source, TaskError, TaskSwitch};

/// What a frame receives when it is advanced: the event that resumed it, or the error raised by
/// the frame that ran above it.
pub type Resume = Result<Event, TaskError>;

/// What a frame reports after being advanced.
///
/// `Ok(Some(_))` produces a value, `Ok(None)` means the frame is exhausted and `Err(_)` means it
/// failed. A frame that does not want to handle an incoming error can simply apply `?` to its
/// [`Resume`] input to pass the error on to the frame below.
pub type Advance = Result<Option<Yield>, TaskError>;

/// A value produced by a frame.
#[derive(Debug)]
#[non_exhaustive]
pub enum Yield {
    /// Let the task switch decide how the thread continues, e.g. wait for an event source.
    Switch(Rc<dyn TaskSwitch>),

    /// Run a nested task to completion before this frame continues.
    Call(Frame),

    /// Plain data. The thread hands it straight back: the frame receives it on its next
    /// advance and, if it is exhausted instead, the frame below resumes with it.
    Value(Event),
}

impl Yield {
    /// Waits for an event source.
    #[must_use]
    pub fn wait(source: Source) -> Self {
        Self::Switch(source)
    }
}

impl From<Event> for Yield {
    fn from(value: Event) -> Self {
        Self::Value(value)
    }
}

impl From<Frame> for Yield {
    fn from(frame: Frame) -> Self {
        Self::Call(frame)
    }
}

/// A suspendable computation that a thread advances step by step.
pub trait Task {
    /// Advances the task with the outcome of whatever it last waited for.
    fn resume(&mut self, input: Resume) -> Advance;
}

/// A [`Task`] built from a closure, see [`task_fn()`].
pub struct FnTask<F> {
    f: F,
}

/// Creates a [`Task`] that calls `f` every time it is advanced.
///
/// # Example
///
/// ```rust
/// use coop_threads::{Event, Thread, Yield, task_fn};
///
/// let mut step = 0;
/// let thread = Thread::new(task_fn(move |input| {
///     let event = input?;
///     step += 1;
///
///     match step {
///         1 => Ok(Some(Yield::Value(Event::from("ping")))),
///         2 => {
///             assert_eq!(event, Event::from("ping"));
///             Ok(None)
///         }
///         _ => unreachable!(),
///     }
/// }))
/// .unwrap();
///
/// assert!(thread.finished());
/// ```
pub fn task_fn<F>(f: F) -> FnTask<F>
where
    F: FnMut(Resume) -> Advance,
{
    FnTask { f }
}

impl<F> Task for FnTask<F>
where
    F: FnMut(Resume) -> Advance,
{
    fn resume(&mut self, input: Resume) -> Advance {
        (self.f)(input)
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>()).finish_non_exhaustive()
    }
}

/// One entry of a thread's execution stack.
#[non_exhaustive]
pub enum Frame {
    /// A plain iterator. It cannot see the events it is resumed with, and an error delivered
    /// to it is passed on to the frame below.
    Raw(Box<dyn Iterator<Item = Yield>>),

    /// A task that observes every resumption.
    Task(Box<dyn Task>),
}

impl Frame {
    /// Wraps a plain iterator as a frame.
    #[must_use]
    pub fn raw<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Yield>,
        I::IntoIter: 'static,
    {
        Self::Raw(Box::new(iter.into_iter()))
    }

    /// Wraps a [`Task`] as a frame.
    #[must_use]
    pub fn task<T>(task: T) -> Self
    where
        T: Task + 'static,
    {
        Self::Task(Box::new(task))
    }

    /// A frame that fails with `error` as soon as it is advanced.
    #[must_use]
    pub fn failing(error: TaskError) -> Self {
        let mut error = Some(error);

        Self::task(task_fn(move |_input| match error.take() {
            Some(error) => Err(error),
            None => Ok(None),
        }))
    }

    pub(crate) fn advance(&mut self, input: Resume) -> Advance {
        match self {
            Self::Raw(iter) => {
                input?;
                Ok(iter.next())
            }
            Self::Task(task) => task.resume(input),
        }
    }
}

impl<T> From<T> for Frame
where
    T: Task + 'static,
{
    fn from(task: T) -> Self {
        Self::task(task)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(_) => f.write_str("Frame::Raw"),
            Self::Task(_) => f.write_str("Frame::Task"),
        }
    }
}
