use thiserror::Error;

/// Errors that travel through the frame stack of a [`Thread`][crate::Thread].
///
/// A frame that fails hands its error to the frame below it, which observes it as the `Err`
/// input of its next advance. An error that leaves the bottom frame is "uncaught" and is surfaced
/// according to the thread variant (see [`Thread`][crate::Thread] and
/// [`ScheduledThread`][crate::ScheduledThread]).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// The task asked to stop cleanly.
    ///
    /// When this reaches the bottom of a thread's stack, the thread is considered finished
    /// rather than failed.
    #[error("task requested termination")]
    Terminated,

    /// The task was interrupted because the event source guarding an
    /// [`Interrupt`][crate::Interrupt] fired first.
    #[error("task was interrupted")]
    Interrupted,

    /// The task did not finish before its alarm went off.
    #[error("task timed out")]
    TimedOut,

    /// The task failed for a reason it describes itself.
    #[error("task failed: {message}")]
    Failed {
        /// A human-readable description of the failure.
        message: String,
    },

    /// The task failed with an error from some other layer.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    /// Creates a [`TaskError::Failed`] with the given message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Whether this is the termination signal that ends a thread cleanly.
    #[must_use]
    pub fn is_termination(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Errors raised when building or driving event sources, as opposed to errors raised by tasks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An [`AnyOf`][crate::AnyOf] needs at least one source to merge.
    #[error("AnyOf requires at least one event source")]
    NoSources,

    /// A value that was expected to be an event source does not have that capability.
    #[error("value is not an event source: {description}")]
    NotAnEventSource {
        /// Debug rendering of the rejected value.
        description: String,
    },

    /// Nothing is scheduled and the awaited event source has not fired, so waiting longer
    /// could never succeed.
    #[error("nothing is scheduled that could make the awaited event source fire")]
    Stalled,

    /// An item was put into a [`Queue`][crate::Queue] after it was closed.
    #[error("queue is closed")]
    QueueClosed,

    /// A [`Queue`][crate::Queue] that is not closed was read from while nothing was buffered.
    #[error("queue has no buffered items")]
    QueueEmpty,
}

/// A specialized `Result` type for event source operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
