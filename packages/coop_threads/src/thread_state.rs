use std::mem;

use crate::{Event, Frame, Resume, TaskError};

/// The execution state of a [`Thread`][crate::Thread]: its stack of frames, the event the
/// running frame will be resumed with, and the error being delivered, if any.
///
/// Task switches receive access to this state while a thread consults them. Most of them only
/// ever need [`yield_event()`][Self::yield_event]. The other transitions belong to the thread's
/// driving loop and are exposed for task switches that restructure the stack, such as
/// nested-task adapters and [`Interrupt`][crate::Interrupt].
#[derive(Debug, Default)]
pub struct ThreadState {
    stack: Vec<Frame>,
    last_event: Event,
    handling_error: bool,
    error: Option<TaskError>,
}

impl ThreadState {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `frame` next, on top of the current frame.
    pub fn call(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    /// Records the event the running frame is resumed with.
    pub fn yield_event(&mut self, event: Event) {
        self.last_event = event;
    }

    /// Discards the topmost frame.
    pub fn return_frame(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    /// Delivers `error` to the topmost frame the next time it is advanced.
    pub fn throw(&mut self, error: TaskError) {
        self.handling_error = true;
        self.error = Some(error);
        self.last_event = Event::Missing;
    }

    /// Marks the error delivered by the last [`throw()`][Self::throw] as handled.
    pub fn catch(&mut self) {
        self.handling_error = false;
        self.error = None;
    }

    /// The event the running frame is resumed with.
    #[must_use]
    pub fn last_event(&self) -> &Event {
        &self.last_event
    }

    /// Whether an error is being delivered, i.e. between [`throw()`][Self::throw] and
    /// [`catch()`][Self::catch].
    #[must_use]
    pub fn handling_error(&self) -> bool {
        self.handling_error
    }

    /// The number of frames on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether the stack has no frames left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Removes the topmost frame so it can be advanced without holding on to the state,
    /// together with the input it is to be advanced with.
    pub(crate) fn take_top(&mut self) -> Option<(Frame, Resume)> {
        let frame = self.stack.pop()?;

        let input = match self.error.take() {
            Some(error) if self.handling_error => Err(error),
            _ => Ok(self.last_event.clone()),
        };

        Some((frame, input))
    }

    /// Takes the error of a failed bottom frame back out of the state.
    pub(crate) fn take_error(&mut self) -> Option<TaskError> {
        self.handling_error = false;
        mem::take(&mut self.error)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::Yield;

    assert_not_impl_any!(ThreadState: Send, Sync);

    fn empty_frame() -> Frame {
        Frame::raw(Vec::<Yield>::new())
    }

    #[test]
    fn call_and_return() {
        let mut state = ThreadState::new();
        assert!(state.is_empty());

        state.call(empty_frame());
        state.call(empty_frame());
        assert_eq!(state.depth(), 2);

        assert!(state.return_frame().is_some());
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn throw_clears_event_until_caught() {
        let mut state = ThreadState::new();
        state.yield_event(Event::from(5));

        state.throw(TaskError::Interrupted);
        assert!(state.handling_error());
        assert!(state.last_event().is_missing());

        state.catch();
        assert!(!state.handling_error());
    }

    #[test]
    fn top_frame_receives_pending_error_once() {
        let mut state = ThreadState::new();
        state.call(empty_frame());
        state.call(empty_frame());
        state.throw(TaskError::TimedOut);

        let (_frame, input) = state.take_top().unwrap();
        assert!(matches!(input, Err(TaskError::TimedOut)));

        state.catch();
        state.yield_event(Event::from(1));
        let (_frame, input) = state.take_top().unwrap();
        assert_eq!(input.unwrap(), Event::from(1));
    }

    #[test]
    fn top_frame_receives_last_event() {
        let mut state = ThreadState::new();
        state.call(empty_frame());
        state.yield_event(Event::from("hello"));

        let (_frame, input) = state.take_top().unwrap();

        assert_eq!(input.unwrap(), Event::from("hello"));
        assert_eq!(state.last_event(), &Event::from("hello"));
        assert!(state.is_empty());
    }
}
