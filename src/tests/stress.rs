//! Stress tests for large pools and long-running schedules.

use super::helpers::{test_runtime, Event, EventLog};
use super::TEST_CONFIG;
use crate::{ShutdownReason, SpawnError};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;

#[test]
fn test_full_pool_of_yielding_threads() {
    let thread_count = TEST_CONFIG.stress_thread_count;
    let iterations = TEST_CONFIG.stress_iterations;
    let rt = test_runtime(thread_count + 1);
    let counter = Rc::new(Cell::new(0usize));
    let log = EventLog::new();
    let (counter_in, log_in) = (counter.clone(), log.clone());

    let shutdown = rt
        .run(move |rt| {
            let mut handles = Vec::with_capacity(thread_count);
            for _ in 0..thread_count {
                let (counter, log) = (counter_in.clone(), log_in.clone());
                let handle = rt
                    .create(move |rt| {
                        for _ in 0..iterations {
                            counter.set(counter.get() + 1);
                            rt.yield_now();
                        }
                        log.check_snapshot(rt);
                    })
                    .unwrap();
                handles.push(handle);
            }

            // The pool is full now.
            if rt.create(|_| {}) != Err(SpawnError::PoolExhausted { capacity: thread_count + 1 }) {
                log_in.push(Event::BadSnapshot(rt.current().unwrap()));
            }

            for handle in handles {
                rt.join(handle).unwrap();
            }
        })
        .unwrap();

    assert_eq!(shutdown.reason, ShutdownReason::Completed);
    assert_eq!(counter.get(), thread_count * iterations);
    assert_eq!(log.count(|e| matches!(e, Event::BadSnapshot(_))), 0);
    assert!(rt.stats().context_switches > thread_count as u64);
}

#[test]
fn test_many_short_lived_threads() {
    let rt = test_runtime(4);
    let finished = Rc::new(Cell::new(0usize));
    let finished_in = finished.clone();
    let rounds = 500;

    let shutdown = rt
        .run(move |rt| {
            for _ in 0..rounds {
                let (a, b) = (finished_in.clone(), finished_in.clone());
                let first = rt.create(move |_| a.set(a.get() + 1)).unwrap();
                let second = rt.create(move |_| b.set(b.get() + 1)).unwrap();
                rt.join(first).unwrap();
                rt.join(second).unwrap();
            }
        })
        .unwrap();

    assert!(shutdown.is_completed());
    assert_eq!(finished.get(), 2 * rounds);
    assert_eq!(rt.stats().threads_created, 2 * rounds as u64 + 1);
}

#[test]
fn test_repeated_runs_on_one_runtime() {
    let rt = test_runtime(8);
    for round in 0..100u64 {
        let total = Rc::new(Cell::new(0u64));
        let total_in = total.clone();
        let shutdown = rt
            .run(move |rt| {
                let mut ids = Vec::new();
                for n in 0..7 {
                    let total = total_in.clone();
                    ids.push(rt.create(move |_| total.set(total.get() + n + round)).unwrap());
                }
                for id in ids {
                    rt.join(id).unwrap();
                }
            })
            .unwrap();

        assert!(shutdown.is_completed());
        assert_eq!(total.get(), 21 + 7 * round);
    }
    assert_eq!(rt.stats().threads_created, 800);
}

#[test]
fn test_deep_chain_of_joins() {
    fn link(rt: &crate::DefaultRuntime, depth: usize, reached: Rc<Cell<usize>>) {
        reached.set(reached.get().max(depth));
        let next = reached.clone();
        if let Ok(child) = rt.create(move |rt| link(rt, depth + 1, next)) {
            rt.join(child).unwrap();
        }
    }

    let capacity = 32;
    let rt = test_runtime(capacity);
    let reached = Rc::new(Cell::new(0));
    let reached_in = reached.clone();

    let shutdown = rt.run(move |rt| link(rt, 0, reached_in)).unwrap();

    assert!(shutdown.is_completed());
    // The chain stops when the pool is exhausted: one thread per slot.
    assert_eq!(reached.get(), capacity - 1);
}
