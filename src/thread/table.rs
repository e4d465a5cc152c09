//! Fixed-capacity arena of thread control blocks.
//!
//! The table is the only cross-thread mutable state of a runtime. Slots are
//! addressed by index; a [`ThreadId`] additionally carries the generation so
//! that stale ids can be recognised once their slot is reused.

use super::{Tcb, ThreadId, ThreadState, BOOTSTRAP_SLOT};
use crate::errors::SpawnError;
use crate::mem::{Stack, StackSizeClass, STACK_CANARY};

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Number of slots in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadCounts {
    pub free: usize,
    pub running: usize,
    pub runnable: usize,
    pub waiting: usize,
}

impl ThreadCounts {
    /// Slots that are not free.
    pub fn live(&self) -> usize {
        self.running + self.runnable + self.waiting
    }
}

/// Pool of thread control blocks.
pub struct ThreadTable<C> {
    slots: Box<[Tcb<C>]>,
    /// Slot whose thread is executing, `None` outside of a run
    current: Option<usize>,
    stack_size: StackSizeClass,
    stack_canary: bool,
}

impl<C: Default> ThreadTable<C> {
    /// Create a table with `capacity` free slots. Stacks are allocated lazily.
    pub fn new(capacity: usize, stack_size: StackSizeClass, stack_canary: bool) -> Self {
        let slots: Vec<Tcb<C>> = (0..capacity).map(|_| Tcb::vacant()).collect();

        Self {
            slots: slots.into_boxed_slice(),
            current: None,
            stack_size,
            stack_canary,
        }
    }

    /// Occupy the free slot `index` for a new thread created by `parent`.
    ///
    /// Allocates the slot's stack on first use, re-arms the canary, resets the
    /// saved context and marks the slot [`Runnable`](ThreadState::Runnable).
    /// The caller still has to prepare the context before the thread can run.
    pub(crate) fn occupy(
        &mut self,
        index: usize,
        parent: Option<ThreadId>,
    ) -> Result<ThreadId, SpawnError> {
        let stack_size = self.stack_size;
        let stack_canary = self.stack_canary;
        let tcb = &mut self.slots[index];
        debug_assert_eq!(tcb.state, ThreadState::Free, "occupying a live slot");

        if tcb.stack.is_none() {
            tcb.stack = Some(Stack::allocate(stack_size).ok_or(SpawnError::OutOfMemory)?);
        }
        if let (true, Some(stack)) = (stack_canary, tcb.stack.as_ref()) {
            stack.install_canary(STACK_CANARY);
        }

        tcb.generation = tcb.generation.wrapping_add(1);
        tcb.parent = parent;
        tcb.live_children = 0;
        tcb.context = C::default();
        tcb.state = ThreadState::Runnable;
        let id = ThreadId::new(index, tcb.generation);

        if let Some(parent) = parent {
            if self.is_live(parent) {
                self.slots[parent.index()].live_children += 1;
            }
        }

        Ok(id)
    }
}

impl<C> ThreadTable<C> {
    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot of the executing thread.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub(crate) fn set_current(&mut self, current: Option<usize>) {
        self.current = current;
    }

    /// Id of the executing thread.
    pub fn current_id(&self) -> Option<ThreadId> {
        self.current.map(|index| self.id_at(index))
    }

    /// Id of the current (or most recent) occupant of `index`.
    pub fn id_at(&self, index: usize) -> ThreadId {
        ThreadId::new(index, self.slots[index].generation)
    }

    pub fn tcb(&self, index: usize) -> &Tcb<C> {
        &self.slots[index]
    }

    pub fn state_at(&self, index: usize) -> ThreadState {
        self.slots[index].state
    }

    pub(crate) fn set_state(&mut self, index: usize, state: ThreadState) {
        self.slots[index].state = state;
    }

    /// States of all slots in index order.
    pub fn states(&self) -> impl Iterator<Item = ThreadState> + '_ {
        self.slots.iter().map(|tcb| tcb.state)
    }

    /// First free slot, by index. Slot 0 is never handed out here.
    pub fn find_free(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(BOOTSTRAP_SLOT + 1)
            .find(|(_, tcb)| tcb.state == ThreadState::Free)
            .map(|(index, _)| index)
    }

    /// `true` while the thread named by `id` still occupies its slot.
    pub fn is_live(&self, id: ThreadId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|tcb| tcb.generation == id.generation() && tcb.state.is_live())
    }

    /// `true` if `id` names a thread that has exited, a slot reused since,
    /// or a slot that does not exist.
    pub fn is_gone(&self, id: ThreadId) -> bool {
        !self.is_live(id)
    }

    /// Free the slot `index`, crediting the exit to its parent if the parent
    /// still occupies its slot.
    pub(crate) fn release(&mut self, index: usize) -> ThreadId {
        let tcb = &mut self.slots[index];
        debug_assert!(tcb.state.is_live(), "releasing a free slot");
        tcb.state = ThreadState::Free;
        let id = ThreadId::new(index, tcb.generation);

        if let Some(parent) = tcb.parent {
            if let Some(parent_tcb) = self.slots.get_mut(parent.index()) {
                if parent_tcb.generation == parent.generation() && parent_tcb.live_children > 0 {
                    parent_tcb.live_children -= 1;
                }
            }
        }

        id
    }

    /// Live children of the occupant of `index`, from the per-slot counter.
    pub fn live_children(&self, index: usize) -> usize {
        self.slots[index].live_children
    }

    /// Same question as [`live_children`](Self::live_children) answered by
    /// scanning every slot for a live thread whose parent is this occupant.
    pub fn has_live_children_scan(&self, index: usize) -> bool {
        let id = self.id_at(index);
        self.slots
            .iter()
            .any(|tcb| tcb.state.is_live() && tcb.parent == Some(id))
    }

    pub fn counts(&self) -> ThreadCounts {
        let mut counts = ThreadCounts::default();
        for tcb in self.slots.iter() {
            match tcb.state {
                ThreadState::Free => counts.free += 1,
                ThreadState::Running => counts.running += 1,
                ThreadState::Runnable => counts.runnable += 1,
                ThreadState::Waiting => counts.waiting += 1,
            }
        }
        counts
    }

    /// `false` if the stack of `index` has overflowed its canary.
    pub fn check_stack(&self, index: usize) -> bool {
        if !self.stack_canary {
            return true;
        }
        self.slots[index]
            .stack
            .as_ref()
            .is_none_or(|stack| stack.check_canary(STACK_CANARY))
    }

    /// Raw pointer to the saved context of `index`.
    ///
    /// The pointer stays valid after the table guard is dropped: slots live in
    /// a boxed slice that is never reallocated.
    pub(crate) fn context_ptr(&mut self, index: usize) -> *mut C {
        &mut self.slots[index].context as *mut C
    }

    pub(crate) fn tcb_mut(&mut self, index: usize) -> &mut Tcb<C> {
        &mut self.slots[index]
    }
}

impl<C> Drop for ThreadTable<C> {
    fn drop(&mut self) {
        // A live slot's stack may still hold frames of a suspended thread.
        // Leak it rather than free memory that those frames point into.
        let mut leaked = 0;
        for tcb in self.slots.iter_mut() {
            if tcb.state.is_live() {
                if let Some(stack) = tcb.stack.take() {
                    core::mem::forget(stack);
                    leaked += 1;
                }
            }
        }
        if leaked > 0 {
            log::debug!("leaking {} stacks of suspended threads", leaked);
        }
    }
}
