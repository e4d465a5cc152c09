//! Scheduler trait definition.

use crate::thread::ThreadTable;

/// Scheduling policy of a [`Runtime`](crate::Runtime).
///
/// The runtime calls both methods with the thread table locked, once per
/// scheduling decision: first [`wake_sweep`](Scheduler::wake_sweep), then
/// [`pick_next`](Scheduler::pick_next). Performing the switch and keeping the
/// running/runnable bookkeeping consistent is the runtime's job.
pub trait Scheduler {
    /// Move waiting threads whose wait condition has cleared to
    /// [`Runnable`](crate::ThreadState::Runnable).
    ///
    /// # Returns
    ///
    /// The number of threads woken.
    fn wake_sweep<C>(&self, table: &mut ThreadTable<C>) -> usize;

    /// Pick the slot to run after `current`.
    ///
    /// # Returns
    ///
    /// - `Some(index)` with `index != current` to switch threads
    /// - `Some(current)` to let the current thread keep the CPU
    /// - `None` if nothing can run, which shuts the runtime down
    fn pick_next<C>(&self, table: &ThreadTable<C>, current: usize) -> Option<usize>;
}
