//! Test helper utilities and common functionality.

use crate::{DefaultRuntime, RuntimeConfig, StackSizeClass, ThreadId, ThreadState, WakeStrategy};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

/// Runtime with `capacity` slots and medium stacks.
pub(crate) fn test_runtime(capacity: usize) -> DefaultRuntime {
    test_runtime_with(capacity, WakeStrategy::default())
}

pub(crate) fn test_runtime_with(capacity: usize, wake: WakeStrategy) -> DefaultRuntime {
    let config = RuntimeConfig::new()
        .capacity(capacity)
        .stack_size(StackSizeClass::Medium)
        .wake_strategy(wake);
    DefaultRuntime::new(config).expect("valid test config")
}

/// Things thread bodies report while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    /// Thread finished step `n` of its work
    Step(ThreadId, usize),
    /// Thread reached the end of its body
    Done(ThreadId),
    /// `join` on the thread returned
    Joined(ThreadId),
    /// A state snapshot did not hold exactly one running thread
    BadSnapshot(ThreadId),
}

/// Shared, ordered record of [`Event`]s.
///
/// Thread bodies never assert directly: a panic cannot unwind out of a pool
/// thread, so observations are recorded here and checked after `run`.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub(crate) fn snapshot(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub(crate) fn position(&self, event: Event) -> Option<usize> {
        self.events.borrow().iter().position(|&e| e == event)
    }

    pub(crate) fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    /// Record the caller's view of the pool, flagging anything but exactly
    /// one running slot that is the caller's own.
    pub(crate) fn check_snapshot(&self, rt: &DefaultRuntime) {
        let Some(me) = rt.current() else {
            return;
        };
        if !single_running(&rt.states(), me.index()) {
            self.push(Event::BadSnapshot(me));
        }
    }
}

/// `true` if `running` is the only running slot in `states`.
pub(crate) fn single_running(states: &[ThreadState], running: usize) -> bool {
    states
        .iter()
        .enumerate()
        .all(|(index, &state)| (state == ThreadState::Running) == (index == running))
}

std::thread_local! {
    static CAPTURED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Logger that keeps the messages of each host thread apart, so tests running
/// in parallel only see the records of their own runtime.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        CAPTURED.with(|captured| captured.borrow_mut().push(format!("{}", record.args())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Start recording log messages of the calling host thread.
pub(crate) fn capture_logs() {
    // Another test may have installed it already.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

/// Messages recorded since [`capture_logs`].
pub(crate) fn captured_logs() -> Vec<String> {
    CAPTURED.with(|captured| captured.borrow().clone())
}
