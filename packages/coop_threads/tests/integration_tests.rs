//! End-to-end tests that drive threads through event sources and the scheduler.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use coop_threads::{
    Advance, AnyOf, Condition, Event, EventSource, ManualClock, Resume, Scheduler, Semaphore,
    Source, TaskError, Thread, Value, Yield, task_fn,
};

type Log<T> = Rc<RefCell<Vec<T>>>;

fn manual_scheduler() -> (ManualClock, Scheduler) {
    let clock = ManualClock::new();
    let scheduler = Scheduler::builder().manual_clock(clock.clone()).build();
    (clock, scheduler)
}

/// A task that waits for `source` once and then finishes.
fn wait_for(source: Source) -> impl FnMut(Resume) -> Advance {
    let mut waited = false;

    move |input| {
        input?;
        if waited {
            return Ok(None);
        }
        waited = true;
        Ok(Some(Yield::wait(Rc::clone(&source))))
    }
}

/// A task that waits for `semaphore`, takes a resource and notes its name.
fn acquire(semaphore: &Rc<Semaphore>, name: &'static str, log: &Log<&'static str>) -> Thread {
    let semaphore = Rc::clone(semaphore);
    let log = Rc::clone(log);
    let mut waited = false;

    Thread::new(task_fn(move |input| {
        input?;
        if waited {
            semaphore.take();
            log.borrow_mut().push(name);
            return Ok(None);
        }
        waited = true;
        Ok(Some(Yield::Switch(semaphore.clone())))
    }))
    .unwrap()
}

#[test]
fn sleepers_fire_at_their_own_time() {
    let (clock, scheduler) = manual_scheduler();
    let log: Log<&'static str> = Log::default();

    for (delay, name) in [(5, "five"), (3, "three")] {
        let log = Rc::clone(&log);
        scheduler
            .sleep(Duration::from_secs(delay))
            .add_callback(Box::new(move |_source, _event| {
                log.borrow_mut().push(name);
                true
            }));
    }

    clock.set(Duration::from_secs(3));
    scheduler.tick();
    assert_eq!(*log.borrow(), vec!["three"]);

    clock.set(Duration::from_secs(5));
    scheduler.tick();
    assert_eq!(*log.borrow(), vec!["three", "five"]);
}

#[test]
fn true_condition_completes_without_stepping() {
    let condition = Condition::new(true);

    let thread = Thread::new(task_fn(wait_for(condition.as_source()))).unwrap();

    assert!(thread.finished());
}

#[test]
fn setting_condition_finishes_waiting_thread() {
    let condition = Condition::new(false);

    let thread = Thread::new(task_fn(wait_for(condition.as_source()))).unwrap();
    assert!(!thread.finished());

    condition.set_value(true);

    assert!(thread.finished());
}

#[test]
fn any_of_fires_once_for_first_value() {
    let values: Vec<_> = (0..3).map(|_| Value::new(0)).collect();
    let any = AnyOf::new(values.iter().map(|value| value.as_source())).unwrap();
    let log: Log<Event> = Log::default();

    let receiver = Rc::clone(&log);
    any.add_callback(Box::new(move |_source, event| {
        receiver.borrow_mut().push(event.clone());
        true
    }));

    values[1].set_value(1);
    values[0].set_value(1);
    values[2].set_value(1);

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert!(Rc::ptr_eq(log[0].source().unwrap(), &values[1].as_source()));
}

#[test]
fn semaphore_admits_waiters_in_order() {
    let semaphore = Semaphore::new(3);
    let log: Log<&'static str> = Log::default();

    let threads: Vec<_> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|name| acquire(&semaphore, name, &log))
        .collect();

    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    assert_eq!(semaphore.count(), 0);
    assert!(!threads[3].finished());
    assert!(!threads[4].finished());

    semaphore.put();
    assert_eq!(*log.borrow(), vec!["a", "b", "c", "d"]);
    assert!(!threads[4].finished());

    semaphore.put();
    assert_eq!(*log.borrow(), vec!["a", "b", "c", "d", "e"]);
    assert!(threads.iter().all(Thread::finished));
    assert_eq!(semaphore.count(), 0);
}

#[test]
fn semaphore_put_and_take_balance() {
    let semaphore = Semaphore::new(2);

    semaphore.put();
    for _ in 0..3 {
        semaphore.take();
    }

    assert_eq!(semaphore.count(), 0);
}

#[test]
fn spawned_thread_runs_on_ticks() {
    let (clock, scheduler) = manual_scheduler();
    let nap = scheduler.sleep(Duration::from_secs(2));

    let thread = scheduler.spawn(task_fn(wait_for(nap.as_source())));
    assert!(!thread.finished());

    clock.advance(Duration::from_secs(2));
    scheduler.tick();

    // The wake-up only queues the thread; it runs on the tick after.
    assert!(!thread.finished());

    scheduler.tick();

    assert!(thread.finished());
    assert!(!thread.is_aborted());
}

#[test]
fn zero_sleep_loop_yields_to_the_scheduler() {
    let (_clock, scheduler) = manual_scheduler();
    let nap = scheduler.sleep(Duration::ZERO);
    let rounds = Rc::new(Cell::new(0_u32));

    let counter = Rc::clone(&rounds);
    let _thread = scheduler.spawn(task_fn(move |input| {
        input?;
        counter.set(counter.get() + 1);
        Ok(Some(Yield::wait(nap.as_source())))
    }));
    assert_eq!(rounds.get(), 1);

    for _ in 0..10 {
        scheduler.tick();
    }

    // One tick fires the sleeper, the next one runs the woken thread.
    assert_eq!(rounds.get(), 6);
    assert_eq!(scheduler.time_available(), Some(Duration::ZERO));
}

#[test]
fn spawned_thread_error_aborts_instead_of_finishing() {
    let (_clock, scheduler) = manual_scheduler();

    let thread = scheduler.spawn(task_fn(|input| {
        input?;
        Err(TaskError::failed("broken"))
    }));

    // Reported on the next tick, not while spawning.
    assert!(!thread.is_aborted());

    scheduler.tick();

    assert!(thread.is_aborted());
    assert!(!thread.finished());
    assert!(matches!(thread.take_error(), Some(TaskError::Failed { .. })));
}

#[test]
fn spawned_thread_termination_finishes_instead_of_aborting() {
    let (_clock, scheduler) = manual_scheduler();

    let thread = scheduler.spawn(task_fn(|input| {
        input?;
        Err(TaskError::Terminated)
    }));
    scheduler.tick();

    assert!(thread.finished());
    assert!(!thread.is_aborted());
    assert!(thread.take_error().is_none());
}

#[test]
fn spawned_thread_failing_after_wake_up_aborts() {
    let (clock, scheduler) = manual_scheduler();
    let nap = scheduler.sleep(Duration::from_secs(1));

    let mut waited = false;
    let thread = scheduler.spawn(task_fn(move |input| {
        input?;
        if waited {
            return Err(TaskError::failed("woke up broken"));
        }
        waited = true;
        Ok(Some(Yield::wait(nap.as_source())))
    }));

    clock.advance(Duration::from_secs(1));
    let aborted = thread.aborted().as_source();
    scheduler.run_until(&aborted).unwrap();

    assert!(thread.is_aborted());
    assert!(!thread.finished());
}

#[test]
fn thread_error_is_returned_synchronously() {
    let result = Thread::new(task_fn(|input| {
        input?;
        Err(TaskError::failed("right away"))
    }));

    assert!(matches!(result, Err(TaskError::Failed { .. })));
}

#[test]
fn thread_termination_finishes_cleanly() {
    let thread = Thread::new(task_fn(|input| {
        input?;
        Err(TaskError::Terminated)
    }))
    .unwrap();

    assert!(thread.finished());
}

#[test]
fn thread_waits_for_another_thread() {
    let (clock, scheduler) = manual_scheduler();
    let nap = scheduler.sleep(Duration::from_secs(4));

    let sleeper = scheduler.spawn(task_fn(wait_for(nap.as_source())));
    let follower = Thread::new(task_fn(wait_for(sleeper.is_finished().as_source()))).unwrap();
    assert!(!follower.finished());

    clock.advance(Duration::from_secs(4));
    scheduler.tick();
    scheduler.tick();

    assert!(sleeper.finished());
    assert!(follower.finished());
}
