//! Index-order scheduler with an all-children-exited wake condition.

use super::trait_def::Scheduler;
use crate::config::WakeStrategy;
use crate::thread::{ThreadState, ThreadTable, BOOTSTRAP_SLOT};

/// First-fit scheduler.
///
/// Every decision scans the pool from slot 0 and picks the first runnable
/// thread other than the caller. There are no priorities and no fairness
/// beyond index order, so a steady supply of low-index work can starve
/// high-index threads.
///
/// A waiting thread is woken once *none* of its children is alive, whichever
/// thread it was joining. A parent joining its children one by one therefore
/// sleeps until the last child exits and then finishes the remaining joins
/// without blocking.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexScanScheduler {
    wake: WakeStrategy,
}

impl IndexScanScheduler {
    pub fn new(wake: WakeStrategy) -> Self {
        Self { wake }
    }

    pub fn wake_strategy(&self) -> WakeStrategy {
        self.wake
    }

    fn children_alive<C>(&self, table: &ThreadTable<C>, index: usize) -> bool {
        match self.wake {
            WakeStrategy::ChildCounters => {
                let alive = table.live_children(index) > 0;
                debug_assert_eq!(alive, table.has_live_children_scan(index));
                alive
            }
            WakeStrategy::Rescan => table.has_live_children_scan(index),
        }
    }
}

impl Scheduler for IndexScanScheduler {
    fn wake_sweep<C>(&self, table: &mut ThreadTable<C>) -> usize {
        let mut woken = 0;

        for index in 0..table.capacity() {
            if table.state_at(index) == ThreadState::Waiting && !self.children_alive(table, index) {
                log::debug!("[scheduler] waking thread {}", table.id_at(index));
                table.set_state(index, ThreadState::Runnable);
                woken += 1;
            }
        }

        woken
    }

    fn pick_next<C>(&self, table: &ThreadTable<C>, current: usize) -> Option<usize> {
        let other = table
            .states()
            .enumerate()
            .find(|&(index, state)| state == ThreadState::Runnable && index != current)
            .map(|(index, _)| index);

        if other.is_some() {
            return other;
        }

        // Nobody else can run: keep going unless this is the bootstrap thread.
        let still_runnable = matches!(
            table.state_at(current),
            ThreadState::Runnable | ThreadState::Running
        );
        (still_runnable && current != BOOTSTRAP_SLOT).then_some(current)
    }
}
