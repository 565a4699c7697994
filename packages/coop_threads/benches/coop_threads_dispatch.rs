#![expect(missing_docs, reason = "benchmarks")]

use std::hint::black_box;
use std::rc::Rc;
use std::time::Duration;

use coop_threads::{Distributor, EventSource, ManualClock, Scheduler, Thread, Value, Yield, task_fn};
use criterion::{Criterion, criterion_group, criterion_main};

const WAITERS: usize = 100;

fn entrypoint(c: &mut Criterion) {
    let mut g = c.benchmark_group("coop_threads_dispatch");

    g.bench_function("distributor_first_acceptor", |b| {
        let distributor = Distributor::new();

        b.iter(|| {
            distributor.add_callback(Box::new(|_source, event| black_box(event).is_truthy()));
            distributor.send(1);
        });
    });

    g.bench_function("value_broadcast", |b| {
        let value = Value::new(0);
        let mut next = 0_i64;

        b.iter(|| {
            for _ in 0..WAITERS {
                value.add_callback(Box::new(|_source, event| {
                    black_box(event);
                    true
                }));
            }

            next = next.wrapping_add(1);
            value.set_value(next);
        });
    });

    g.bench_function("thread_resume", |b| {
        let distributor = Distributor::new();

        let source = distributor.as_source();
        let thread = Thread::new(task_fn(move |input| {
            black_box(input?);
            Ok(Some(Yield::wait(Rc::clone(&source))))
        }))
        .unwrap();

        b.iter(|| {
            distributor.send(1);
        });

        black_box(thread);
    });

    g.bench_function("scheduler_tick", |b| {
        let clock = ManualClock::new();
        let scheduler = Scheduler::builder().manual_clock(clock.clone()).build();

        b.iter(|| {
            for i in 0..WAITERS {
                let delay = Duration::from_millis(u64::try_from(i % 10).unwrap());
                scheduler.call_at(clock.now() + delay, |now| {
                    black_box(now);
                });
            }

            clock.advance(Duration::from_millis(10));
            scheduler.tick();
        });
    });

    g.finish();
}

criterion_group!(benches, entrypoint);
criterion_main!(benches);
