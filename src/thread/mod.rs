//! Thread identity, lifecycle states and thread control blocks.

use crate::mem::Stack;

pub mod table;

pub use table::{ThreadCounts, ThreadTable};

/// Slot reserved for the thread that bootstraps a run.
pub const BOOTSTRAP_SLOT: usize = 0;

/// Identity of a thread: its slot in the pool plus the slot's generation.
///
/// The generation advances every time a slot is occupied, so an id that
/// outlives its thread never names the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId {
    index: u32,
    generation: u32,
}

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

impl ThreadId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    /// Slot index of this thread in the pool.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this thread was created.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Lifecycle state of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Slot is unoccupied
    Free = 0,
    /// Thread is executing
    Running = 1,
    /// Thread can be picked by the scheduler
    Runnable = 2,
    /// Thread is blocked in `join` until its children have exited
    Waiting = 3,
}

impl ThreadState {
    /// `true` for every state but [`Free`](ThreadState::Free).
    pub fn is_live(self) -> bool {
        self != ThreadState::Free
    }
}

/// Thread control block: one per pool slot.
pub struct Tcb<C> {
    pub(crate) generation: u32,
    pub(crate) parent: Option<ThreadId>,
    pub(crate) state: ThreadState,
    pub(crate) context: C,
    pub(crate) stack: Option<Stack>,
    /// Threads created by this occupant that have not exited yet.
    pub(crate) live_children: usize,
}

impl<C: Default> Tcb<C> {
    fn vacant() -> Self {
        Self {
            generation: 0,
            parent: None,
            state: ThreadState::Free,
            context: C::default(),
            stack: None,
            live_children: 0,
        }
    }
}

impl<C> Tcb<C> {
    /// Current lifecycle state.
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Creator of the current (or most recent) occupant.
    pub fn parent(&self) -> Option<ThreadId> {
        self.parent
    }

    /// Generation of the current (or most recent) occupant.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Get the thread's stack bottom (initial stack pointer).
    pub fn stack_bottom(&self) -> Option<*mut u8> {
        self.stack.as_ref().map(|stack| stack.stack_bottom())
    }
}
