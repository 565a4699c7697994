//! Cooperative lightweight threads driven by event sources and a time scheduler.
//!
//! A [`Thread`] runs a stack of suspendable frames on the calling OS thread. Whenever a frame
//! yields an event source that is not ready, the thread suspends and registers itself with that
//! source; it continues, synchronously, inside whatever call makes the source fire. There is no
//! parallelism and there are no locks: every handle in this crate is single-threaded.
//!
//! # Quick start
//!
//! ```rust
//! use coop_threads::{Condition, Thread, Yield, task_fn};
//!
//! let ready = Condition::new(false);
//!
//! let waiting_for = ready.clone();
//! let mut waited = false;
//! let thread = Thread::new(task_fn(move |input| {
//!     input?;
//!     if waited {
//!         return Ok(None);
//!     }
//!     waited = true;
//!     Ok(Some(Yield::Switch(waiting_for.clone())))
//! }))
//! .unwrap();
//!
//! assert!(!thread.finished());
//!
//! ready.set_value(true);
//! assert!(thread.finished());
//! ```
//!
//! # Event sources
//!
//! - [`Distributor`] offers each event to the first callback that accepts it.
//! - [`Value`] broadcasts every change of a stored value.
//! - [`Condition`] wakes its waiters when its value becomes true, and never suspends them
//!   while it stays true.
//! - [`Semaphore`] wakes one waiter per increment of its count.
//! - [`Queue`] buffers items and wakes one reader per item.
//! - [`AnyOf`] fires once when the first of several sources fires.
//! - [`Scheduler::sleep()`], [`Scheduler::until()`] and [`Scheduler::timeout()`] fire as time
//!   passes, when the scheduler is ticked.
//!
//! Callbacks registered with an event source are one-shot. Use
//! [`EventSource::add_subscriber()`] to keep receiving events.
//!
//! # Errors
//!
//! A frame fails by returning [`TaskError`], which is delivered to the frame below it. An
//! error that leaves the bottom frame is returned from [`Thread::new()`] or [`Thread::step()`],
//! or raised as a panic if an event source callback made the thread run. Threads spawned with
//! [`Scheduler::spawn()`] report it through [`ScheduledThread::aborted()`] instead.
//! [`TaskError::Terminated`] ends a thread cleanly in both cases.

pub mod adapt;
mod any_of;
mod clock;
mod condition;
mod dispatch;
mod distributor;
mod error;
mod event;
mod interrupt;
mod queue;
mod scheduler;
mod semaphore;
mod source;
mod subscription;
mod task;
mod thread;
mod thread_state;
mod value;

pub use any_of::*;
pub use clock::ManualClock;
pub use condition::Condition;
pub use distributor::*;
pub use error::*;
pub use event::*;
pub use interrupt::*;
pub use queue::*;
pub use scheduler::*;
pub use semaphore::*;
pub use source::{
    Action, Callback, EventSource, ReadableSource, Source, SwitchContext, TaskSwitch,
    WritableSource,
};
pub use subscription::*;
pub use task::*;
pub use thread::*;
pub use thread_state::*;
pub use value::Value;
