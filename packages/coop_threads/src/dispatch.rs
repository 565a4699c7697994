use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;

use scopeguard::guard;

use crate::{Callback, Event, Source};

/// How a fired event is handed to the registered callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Callbacks are offered the event in registration order until one accepts it.
    FirstAcceptor,

    /// Every callback receives the event, regardless of what it returns.
    Broadcast,
}

/// Ordered registry of pending one-shot callbacks.
pub(crate) struct CallbackList {
    pending: RefCell<VecDeque<Callback>>,
    dispatch: Dispatch,
}

impl CallbackList {
    pub(crate) fn new(dispatch: Dispatch) -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
            dispatch,
        }
    }

    pub(crate) fn add(&self, callback: Callback) {
        self.pending.borrow_mut().push_back(callback);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Delivers `event` to the callbacks registered before this call.
    ///
    /// The registry is swapped out before any callback runs, so callbacks registered during
    /// dispatch wait for the next call. In first-acceptor mode the callbacks that were not
    /// tried are put back ahead of any added during dispatch, also when a callback panics.
    pub(crate) fn send(&self, source: &Source, event: &Event) {
        let taken = mem::take(&mut *self.pending.borrow_mut());

        match self.dispatch {
            Dispatch::Broadcast => {
                for callback in taken {
                    callback(source, event);
                }
            }
            Dispatch::FirstAcceptor => {
                let mut untried = guard(taken, |untried| self.restore(untried));

                while let Some(callback) = untried.pop_front() {
                    if callback(source, event) {
                        break;
                    }
                }
            }
        }
    }

    fn restore(&self, untried: VecDeque<Callback>) {
        if untried.is_empty() {
            return;
        }

        let mut pending = self.pending.borrow_mut();
        let added_during_dispatch = mem::replace(&mut *pending, untried);
        pending.extend(added_during_dispatch);
    }
}

impl fmt::Debug for CallbackList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList")
            .field("pending", &self.len())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::RefCell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    use super::*;
    use crate::{Distributor, EventSource};

    fn recorder(
        log: &Rc<RefCell<Vec<(&'static str, Event)>>>,
        name: &'static str,
        accept: bool,
    ) -> Callback {
        let log = Rc::clone(log);
        Box::new(move |_source, event| {
            log.borrow_mut().push((name, event.clone()));
            accept
        })
    }

    #[test]
    fn first_acceptor_stops_at_first_acceptance() {
        let list = CallbackList::new(Dispatch::FirstAcceptor);
        let source = Distributor::new().as_source();
        let log = Rc::new(RefCell::new(Vec::new()));

        list.add(recorder(&log, "declines", false));
        list.add(recorder(&log, "accepts", true));
        list.add(recorder(&log, "untried", true));

        list.send(&source, &Event::from(1));

        assert_eq!(
            *log.borrow(),
            vec![("declines", Event::from(1)), ("accepts", Event::from(1))]
        );
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn broadcast_calls_everyone() {
        let list = CallbackList::new(Dispatch::Broadcast);
        let source = Distributor::new().as_source();
        let log = Rc::new(RefCell::new(Vec::new()));

        list.add(recorder(&log, "a", true));
        list.add(recorder(&log, "b", false));
        list.add(recorder(&log, "c", true));

        list.send(&source, &Event::from(7));

        assert_eq!(log.borrow().len(), 3);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn untried_callbacks_restored_ahead_of_new_ones() {
        let list = Rc::new(CallbackList::new(Dispatch::FirstAcceptor));
        let source = Distributor::new().as_source();
        let log = Rc::new(RefCell::new(Vec::new()));

        let list_clone = Rc::clone(&list);
        let late = recorder(&log, "late", true);
        list.add(Box::new(move |_source, _event| {
            list_clone.add(late);
            true
        }));
        list.add(recorder(&log, "early", true));

        list.send(&source, &Event::from(1));
        assert!(log.borrow().is_empty());

        list.send(&source, &Event::from(2));
        list.send(&source, &Event::from(3));

        assert_eq!(
            *log.borrow(),
            vec![("early", Event::from(2)), ("late", Event::from(3))]
        );
    }

    #[test]
    fn untried_callbacks_survive_a_panicking_callback() {
        let list = CallbackList::new(Dispatch::FirstAcceptor);
        let source = Distributor::new().as_source();
        let log = Rc::new(RefCell::new(Vec::new()));

        list.add(Box::new(|_source, _event| panic!("misbehaving callback")));
        list.add(recorder(&log, "survivor", true));

        let result = panic::catch_unwind(AssertUnwindSafe(|| list.send(&source, &Event::from(1))));
        assert!(result.is_err());
        assert_eq!(list.len(), 1);

        list.send(&source, &Event::from(2));
        assert_eq!(*log.borrow(), vec![("survivor", Event::from(2))]);
    }
}
