//! The cooperative runtime: owns the thread pool and performs every switch.
//!
//! A [`Runtime`] is driven from an ordinary host thread by [`Runtime::run`].
//! The closure given to `run` becomes the bootstrap thread in slot 0; it and
//! every thread it creates run on pool stacks until the scheduler finds no
//! runnable thread left, at which point control returns to the host and `run`
//! reports how the run ended.
//!
//! Threads only ever give up the CPU inside a runtime call (`yield_now`,
//! `join`, `exit`), so there is no preemption and no interrupt masking.

use crate::arch::{Arch, DefaultArch};
use crate::config::RuntimeConfig;
use crate::errors::{ConfigError, JoinError, RunError, Shutdown, ShutdownReason, SpawnError};
use crate::sched::{DefaultScheduler, IndexScanScheduler, Scheduler};
use crate::thread::{ThreadCounts, ThreadId, ThreadState, ThreadTable, BOOTSTRAP_SLOT};
use core::cell::UnsafeCell;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Body of a thread that has not started yet.
type Entry<A, S> = Box<dyn FnOnce(&Runtime<A, S>)>;

/// Runtime with the architecture and scheduler picked for this target.
pub type DefaultRuntime = Runtime<DefaultArch, DefaultScheduler>;

/// Snapshot of the scheduling counters of a runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Scheduling decisions taken
    pub schedule_calls: u64,
    /// Decisions that resumed a different thread
    pub context_switches: u64,
    /// Waiting threads moved back to runnable
    pub wakeups: u64,
    /// Threads created, including bootstrap threads
    pub threads_created: u64,
}

struct Counters {
    schedule_calls: AtomicU64,
    context_switches: AtomicU64,
    wakeups: AtomicU64,
    threads_created: AtomicU64,
}

impl Counters {
    const fn new() -> Self {
        Self {
            schedule_calls: AtomicU64::new(0),
            context_switches: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
            threads_created: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> SchedStats {
        SchedStats {
            schedule_calls: self.schedule_calls.load(Ordering::Relaxed),
            context_switches: self.context_switches.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            threads_created: self.threads_created.load(Ordering::Relaxed),
        }
    }
}

/// Cooperative user-level thread runtime.
///
/// Holds a fixed pool of [`capacity`](RuntimeConfig::capacity) thread slots.
/// Only one thread of a runtime executes at any time; the runtime is neither
/// `Send` nor `Sync` and every thread body receives it by shared reference.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation that switches contexts
/// * `S` - Scheduler implementation that picks the next thread
///
/// # Example
///
/// ```
/// use cooperative_threads::{DefaultRuntime, RuntimeConfig};
///
/// let runtime = DefaultRuntime::new(RuntimeConfig::default()).unwrap();
/// let shutdown = runtime
///     .run(|rt| {
///         let child = rt.create(|_| { /* work */ }).unwrap();
///         rt.join(child).unwrap();
///     })
///     .unwrap();
/// assert!(shutdown.is_completed());
/// ```
pub struct Runtime<A: Arch = DefaultArch, S: Scheduler = DefaultScheduler> {
    scheduler: S,
    table: spin::Mutex<ThreadTable<A::SavedContext>>,
    /// Bodies of created threads that have not been entered yet, by slot
    entries: spin::Mutex<Vec<Option<Entry<A, S>>>>,
    /// Context of the host thread that called `run`
    host: UnsafeCell<A::SavedContext>,
    shutdown: spin::Mutex<Option<Shutdown>>,
    /// Thread whose stack canary was found overwritten, ending the run
    overflow: spin::Mutex<Option<ThreadId>>,
    running: AtomicBool,
    counters: Counters,
}

impl<A: Arch> Runtime<A, IndexScanScheduler> {
    /// Create a runtime with the index-scan scheduler.
    ///
    /// The scheduler's wake strategy is taken from `config`.
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        Self::with_scheduler(IndexScanScheduler::new(config.get_wake_strategy()), config)
    }
}

impl<A: Arch, S: Scheduler> Runtime<A, S> {
    /// Create a runtime that schedules with `scheduler`.
    ///
    /// # Returns
    ///
    /// The runtime with every slot free, or the reason `config` is invalid.
    pub fn with_scheduler(scheduler: S, config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.get_capacity();

        Ok(Self {
            scheduler,
            table: spin::Mutex::new(ThreadTable::new(
                capacity,
                config.get_stack_size(),
                config.get_stack_canary(),
            )),
            entries: spin::Mutex::new((0..capacity).map(|_| None).collect()),
            host: UnsafeCell::new(A::SavedContext::default()),
            shutdown: spin::Mutex::new(None),
            overflow: spin::Mutex::new(None),
            running: AtomicBool::new(false),
            counters: Counters::new(),
        })
    }

    /// Get a reference to the scheduler.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Number of pool slots, the bootstrap slot included.
    pub fn capacity(&self) -> usize {
        self.table.lock().capacity()
    }

    /// `true` between entering [`run`](Self::run) and its return.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run `main` as the bootstrap thread until no thread can run any more.
    ///
    /// Blocks the calling host thread for the whole run. `main` occupies
    /// slot 0 with no parent; the threads it creates take slots `1..`.
    ///
    /// # Returns
    ///
    /// The shutdown record: [`Completed`](ShutdownReason::Completed) when
    /// every thread exited, [`Deadlocked`](ShutdownReason::Deadlocked) when
    /// threads remain that nothing will ever resume. After a deadlocked run
    /// the stranded slots stay allocated and further runs are refused with
    /// [`RunError::StaleThreads`].
    ///
    /// # Panics
    ///
    /// Panics on the calling host thread if a thread overran its stack. The
    /// run ends at the first scheduling decision after the overflow.
    pub fn run<F>(&self, main: F) -> Result<Shutdown, RunError>
    where
        F: FnOnce(&Self) + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RunError::AlreadyRunning);
        }

        let boot_ctx = match self.enter_bootstrap(main) {
            Ok(ctx) => ctx,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(e);
            }
        };

        // Park the host here; the last scheduling decision switches back.
        unsafe { A::context_switch(self.host.get(), boot_ctx) };

        if let Some(id) = self.overflow.lock().take() {
            self.running.store(false, Ordering::Release);
            panic!("stack overflow in thread {}", id);
        }

        let shutdown = self.shutdown.lock().take();
        let shutdown =
            shutdown.unwrap_or_else(|| Shutdown::with_live(self.table.lock().counts().live()));
        self.running.store(false, Ordering::Release);
        Ok(shutdown)
    }

    fn enter_bootstrap<F>(&self, main: F) -> Result<*const A::SavedContext, RunError>
    where
        F: FnOnce(&Self) + 'static,
    {
        let mut table = self.table.lock();
        let live = table.counts().live();
        if live > 0 {
            return Err(RunError::StaleThreads { live });
        }

        let boot = table
            .occupy(BOOTSTRAP_SLOT, None)
            .map_err(RunError::Spawn)?;
        self.prepare_slot(&mut table, BOOTSTRAP_SLOT);
        table.set_state(BOOTSTRAP_SLOT, ThreadState::Running);
        table.set_current(Some(BOOTSTRAP_SLOT));
        self.entries.lock()[BOOTSTRAP_SLOT] = Some(Box::new(main));
        *self.shutdown.lock() = None;
        self.counters.threads_created.fetch_add(1, Ordering::Relaxed);

        log::debug!("[runtime] bootstrap thread {} entering", boot);
        Ok(table.context_ptr(BOOTSTRAP_SLOT) as *const _)
    }

    /// Point the fresh context of `index` at the thread trampoline.
    fn prepare_slot(&self, table: &mut ThreadTable<A::SavedContext>, index: usize) {
        let arg = self as *const Self as usize;
        let tcb = table.tcb_mut(index);
        if let Some(bottom) = tcb.stack_bottom() {
            unsafe { A::prepare_context(&mut tcb.context, bottom, thread_start::<A, S>, arg) };
        }
    }

    /// Create a thread running `entry`, with the calling thread as its parent.
    ///
    /// The new thread takes the lowest free slot and starts as
    /// [`Runnable`](ThreadState::Runnable); the caller keeps running.
    ///
    /// # Returns
    ///
    /// The new thread's id, or
    /// - [`SpawnError::PoolExhausted`] if every slot is taken
    /// - [`SpawnError::OutOfMemory`] if a slot's stack cannot be allocated
    /// - [`SpawnError::NotRunning`] if called outside of [`run`](Self::run)
    ///
    /// On error the pool is left unchanged.
    pub fn create<F>(&self, entry: F) -> Result<ThreadId, SpawnError>
    where
        F: FnOnce(&Self) + 'static,
    {
        let mut table = self.table.lock();
        let parent = table.current_id().ok_or(SpawnError::NotRunning)?;
        let index = table.find_free().ok_or(SpawnError::PoolExhausted {
            capacity: table.capacity(),
        })?;

        let id = table.occupy(index, Some(parent))?;
        self.prepare_slot(&mut table, index);
        self.entries.lock()[index] = Some(Box::new(entry));
        self.counters.threads_created.fetch_add(1, Ordering::Relaxed);

        log::debug!("[runtime] thread {} created thread {}", parent, id);
        Ok(id)
    }

    /// Block until `target` has exited.
    ///
    /// Returns at once if `target` is already gone, including when its slot
    /// has been reused by a newer thread. Otherwise the caller waits, and is
    /// only woken once *all* of its own children have exited. Joining a
    /// thread that is not a child therefore returns after the caller's
    /// children are gone and `target` has exited.
    ///
    /// # Returns
    ///
    /// - [`JoinError::WouldDeadlock`] if `target` is the calling thread
    /// - [`JoinError::NotRunning`] if called outside of [`run`](Self::run)
    pub fn join(&self, target: ThreadId) -> Result<(), JoinError> {
        let mut waited = false;
        loop {
            {
                let mut table = self.table.lock();
                let current = table.current().ok_or(JoinError::NotRunning)?;
                if table.is_gone(target) {
                    if waited {
                        log::debug!("[runtime] thread {} joined {}", table.id_at(current), target);
                    }
                    return Ok(());
                }
                if table.id_at(current) == target {
                    return Err(JoinError::WouldDeadlock);
                }

                log::trace!("[runtime] thread {} waits for {}", table.id_at(current), target);
                table.set_state(current, ThreadState::Waiting);
            }

            waited = true;
            self.schedule();
        }
    }

    /// Let another runnable thread run; the caller stays runnable.
    ///
    /// Does nothing outside of [`run`](Self::run).
    pub fn yield_now(&self) {
        self.schedule();
    }

    /// Terminate the calling thread.
    ///
    /// Frees the caller's slot and never returns. Returning from a thread
    /// body has the same effect.
    ///
    /// # Panics
    ///
    /// Panics if called outside of [`run`](Self::run).
    pub fn exit(&self) -> ! {
        {
            let mut table = self.table.lock();
            let Some(index) = table.current() else {
                panic!("Runtime::exit called outside of a running thread");
            };
            let id = table.release(index);
            log::debug!("[runtime] thread {} exited", id);
        }

        self.schedule();
        unreachable!("exited thread was resumed")
    }

    /// Take one scheduling decision and switch if it names another context.
    ///
    /// Wakes waiters whose children are gone, then asks the scheduler for
    /// the next thread. The caller is demoted to runnable if it was running,
    /// left waiting or free otherwise. When nothing can run, or the caller's
    /// stack canary has been overwritten, the run ends and control goes back
    /// to the host thread.
    fn schedule(&self) {
        let switch = {
            let mut table = self.table.lock();
            let Some(current) = table.current() else {
                return;
            };
            self.counters.schedule_calls.fetch_add(1, Ordering::Relaxed);

            if !table.check_stack(current) {
                let id = table.id_at(current);
                log::error!("[runtime] stack overflow in thread {}", id);
                table.set_current(None);
                *self.overflow.lock() = Some(id);
                let prev_ctx = table.context_ptr(current);
                drop(table);
                unsafe { A::context_switch(prev_ctx, self.host.get()) };
                return;
            }

            let woken = self.scheduler.wake_sweep(&mut *table);
            self.counters.wakeups.fetch_add(woken as u64, Ordering::Relaxed);

            match self.scheduler.pick_next(&*table, current) {
                Some(next) if next == current => {
                    table.set_state(current, ThreadState::Running);
                    None
                }
                Some(next) => {
                    debug_assert_eq!(table.state_at(next), ThreadState::Runnable);
                    if table.state_at(current) == ThreadState::Running {
                        table.set_state(current, ThreadState::Runnable);
                    }
                    table.set_state(next, ThreadState::Running);
                    table.set_current(Some(next));
                    debug_assert_eq!(table.counts().running, 1);

                    log::trace!(
                        "[runtime] switch {} -> {}",
                        table.id_at(current),
                        table.id_at(next)
                    );
                    self.counters.context_switches.fetch_add(1, Ordering::Relaxed);
                    let prev_ctx = table.context_ptr(current);
                    let next_ctx = table.context_ptr(next) as *const _;
                    Some((prev_ctx, next_ctx))
                }
                None => {
                    let shutdown = Shutdown::with_live(table.counts().live());
                    match shutdown.reason {
                        ShutdownReason::Completed => {
                            log::info!("[runtime] all threads completed")
                        }
                        ShutdownReason::Deadlocked => log::warn!(
                            "[runtime] no runnable threads, {} still allocated",
                            shutdown.live
                        ),
                    }

                    table.set_current(None);
                    *self.shutdown.lock() = Some(shutdown);
                    let prev_ctx = table.context_ptr(current);
                    Some((prev_ctx, self.host.get() as *const _))
                }
            }
        };

        // Release lock before context switch
        if let Some((prev_ctx, next_ctx)) = switch {
            unsafe { A::context_switch(prev_ctx, next_ctx) };
        }
    }

    /// Run the body stored for the current slot, then exit.
    fn start_current(&self) -> ! {
        let index = self.table.lock().current();
        let entry = index.and_then(|index| self.entries.lock()[index].take());
        if let Some(entry) = entry {
            entry(self);
        }
        self.exit()
    }

    /// Id of the calling thread, `None` outside of [`run`](Self::run).
    pub fn current(&self) -> Option<ThreadId> {
        self.table.lock().current_id()
    }

    /// State of `id`; [`Free`](ThreadState::Free) once the thread is gone.
    pub fn state(&self, id: ThreadId) -> ThreadState {
        let table = self.table.lock();
        if table.is_live(id) {
            table.state_at(id.index())
        } else {
            ThreadState::Free
        }
    }

    /// Creator of `id`, `None` for bootstrap threads and gone threads.
    pub fn parent(&self, id: ThreadId) -> Option<ThreadId> {
        let table = self.table.lock();
        if table.is_live(id) {
            table.tcb(id.index()).parent()
        } else {
            None
        }
    }

    /// States of all slots in index order.
    pub fn states(&self) -> Vec<ThreadState> {
        self.table.lock().states().collect()
    }

    pub fn thread_counts(&self) -> ThreadCounts {
        self.table.lock().counts()
    }

    pub fn stats(&self) -> SchedStats {
        self.counters.snapshot()
    }
}

/// First code every pool thread runs; `runtime` is the owning [`Runtime`].
extern "C" fn thread_start<A: Arch, S: Scheduler>(runtime: usize) -> ! {
    // The runtime outlives every thread: `run` borrows it until the last
    // thread has switched back to the host.
    let runtime = unsafe { &*(runtime as *const Runtime<A, S>) };
    runtime.start_current()
}
