//! Capability queries on the values that frames produce.
//!
//! A thread only ever asks two things of a produced value: whether it can act as a task
//! switch (event sources, nested tasks and the like), and whether it can run as a nested frame.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::{Action, Event, Frame, Source, SwitchContext, TaskSwitch, Yield};

/// Adapts a produced value to the task switch capability.
///
/// Nested tasks are adapted into a switch that pushes them onto the thread's stack. Plain
/// data has no such capability and is handed back unchanged as the error value.
pub fn try_as_switch(produced: Yield) -> Result<Rc<dyn TaskSwitch>, Event> {
    match produced {
        Yield::Switch(switch) => Ok(switch),
        Yield::Call(frame) => Ok(Rc::new(TaskAsSwitch::new(frame))),
        Yield::Value(value) => Err(value),
    }
}

/// Adapts a produced value to the event source capability.
pub fn try_as_source(produced: &Yield) -> Option<Source> {
    match produced {
        Yield::Switch(switch) => switch.as_event_source(),
        Yield::Call(_) | Yield::Value(_) => None,
    }
}

/// Adapts a produced value to a frame that a thread can run, handing it back unchanged if it
/// cannot be run.
pub fn try_as_task(produced: Yield) -> Result<Frame, Yield> {
    match produced {
        Yield::Call(frame) => Ok(frame),
        other => Err(other),
    }
}

/// Task switch that runs a nested frame next.
#[derive(Debug)]
struct TaskAsSwitch {
    frame: RefCell<Option<Frame>>,
}

impl TaskAsSwitch {
    fn new(frame: Frame) -> Self {
        Self {
            frame: RefCell::new(Some(frame)),
        }
    }
}

impl TaskSwitch for TaskAsSwitch {
    fn next_action(&self, context: Option<SwitchContext<'_>>) -> Action {
        if let Some(context) = context {
            match self.frame.borrow_mut().take() {
                Some(frame) => context.state().call(frame),
                None => warn!("nested task was already started and cannot be started again"),
            }
        }

        Action::Proceed
    }
}
