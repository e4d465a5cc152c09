//! Fixed-size thread stacks.
//!
//! Every pool slot owns at most one [`Stack`]. It is allocated the first time
//! the slot is occupied and then reused by every later occupant of that slot,
//! so a stack is never shared between two live threads.

use core::ptr::NonNull;

extern crate alloc;
use alloc::alloc::{alloc, dealloc, Layout};

/// Value written at the lowest address of every stack.
pub const STACK_CANARY: u64 = 0xDEAD_BEEF_CAFE_BABE;

const STACK_ALIGN: usize = 4096;

/// Stack size classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSizeClass {
    /// Small stack: 4 KiB
    Small = 4096,
    /// Medium stack: 16 KiB
    Medium = 16384,
    /// Large stack: 64 KiB
    Large = 65536,
    /// Extra large stack: 256 KiB
    ExtraLarge = 262144,
}

impl StackSizeClass {
    /// Get the size in bytes for this stack class.
    pub fn size(self) -> usize {
        self as usize
    }

    /// Choose the smallest size class that can hold `requested_size` bytes.
    pub fn for_size(requested_size: usize) -> Option<Self> {
        match requested_size {
            0..=4096 => Some(Self::Small),
            4097..=16384 => Some(Self::Medium),
            16385..=65536 => Some(Self::Large),
            65537..=262144 => Some(Self::ExtraLarge),
            _ => None,
        }
    }
}

impl Default for StackSizeClass {
    fn default() -> Self {
        Self::Medium
    }
}

/// An exclusively owned, heap-allocated thread stack.
pub struct Stack {
    /// Lowest address of the allocation
    memory: NonNull<u8>,
    size_class: StackSizeClass,
}

impl Stack {
    /// Allocate a stack of the given size class.
    ///
    /// Returns `None` if the global allocator is out of memory.
    pub fn allocate(size_class: StackSizeClass) -> Option<Self> {
        let layout = Layout::from_size_align(size_class.size(), STACK_ALIGN).ok()?;
        let memory = NonNull::new(unsafe { alloc(layout) })?;

        Some(Self { memory, size_class })
    }

    /// Get the usable stack size in bytes.
    pub fn size(&self) -> usize {
        self.size_class.size()
    }

    /// Get the stack size class.
    pub fn size_class(&self) -> StackSizeClass {
        self.size_class
    }

    /// Highest address of the stack, 16-byte aligned. The initial stack
    /// pointer of a thread starts here and grows down.
    pub fn stack_bottom(&self) -> *mut u8 {
        let end = self.memory.as_ptr() as usize + self.size();
        (end & !0xF) as *mut u8
    }

    /// Lowest address of the stack.
    pub fn stack_top(&self) -> *const u8 {
        self.memory.as_ptr()
    }

    /// Write `canary` at the lowest address so overflow can be detected.
    pub fn install_canary(&self, canary: u64) {
        let canary_location = self.memory.as_ptr() as *mut u64;
        unsafe {
            canary_location.write(canary);
        }
    }

    /// `true` if the canary written by [`install_canary`](Self::install_canary)
    /// is still intact.
    pub fn check_canary(&self, expected_canary: u64) -> bool {
        let canary_location = self.memory.as_ptr() as *const u64;
        unsafe { canary_location.read() == expected_canary }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        if let Ok(layout) = Layout::from_size_align(self.size(), STACK_ALIGN) {
            unsafe {
                dealloc(self.memory.as_ptr(), layout);
            }
        }
    }
}

impl core::fmt::Debug for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("memory", &self.memory)
            .field("size_class", &self.size_class)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_size_class_for_size() {
        assert_eq!(StackSizeClass::for_size(1024), Some(StackSizeClass::Small));
        assert_eq!(StackSizeClass::for_size(4096), Some(StackSizeClass::Small));
        assert_eq!(StackSizeClass::for_size(8192), Some(StackSizeClass::Medium));
        assert_eq!(StackSizeClass::for_size(32768), Some(StackSizeClass::Large));
        assert_eq!(StackSizeClass::for_size(131072), Some(StackSizeClass::ExtraLarge));
        assert_eq!(StackSizeClass::for_size(500000), None);
    }

    #[test]
    fn test_stack_bounds() {
        let stack = Stack::allocate(StackSizeClass::Small).unwrap();

        assert_eq!(stack.size(), 4096);
        let bottom = stack.stack_bottom() as usize;
        let top = stack.stack_top() as usize;
        assert_eq!(bottom % 16, 0);
        assert!(bottom > top);
        assert!(bottom - top <= stack.size());
    }

    #[test]
    fn test_stack_canary() {
        let stack = Stack::allocate(StackSizeClass::Small).unwrap();

        stack.install_canary(STACK_CANARY);
        assert!(stack.check_canary(STACK_CANARY));
        assert!(!stack.check_canary(0x1234567890ABCDEF));
    }
}
