//! AArch64 (AAPCS64) context switching.
//!
//! x19-x30 and d8-d15 are stored in a 160-byte frame on the outgoing thread's
//! stack; the saved context is the stack pointer of that frame.

use super::{Arch, ThreadEntry};
use core::arch::naked_asm;

const FRAME_WORDS: usize = 20;

/// Saved thread context for AArch64.
#[repr(C)]
#[derive(Debug, Default)]
pub struct Aarch64Context {
    pub sp: u64,
}

/// AArch64 architecture implementation.
pub struct Aarch64Arch;

impl Arch for Aarch64Arch {
    type SavedContext = Aarch64Context;

    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext) {
        unsafe { switch_stacks(prev, next) }
    }

    unsafe fn prepare_context(
        ctx: &mut Self::SavedContext,
        stack_bottom: *mut u8,
        entry: ThreadEntry,
        arg: usize,
    ) {
        let frame_end = (stack_bottom as usize & !0xF) as *mut u64;

        unsafe {
            let sp = frame_end.sub(FRAME_WORDS);
            for word in 0..FRAME_WORDS {
                sp.add(word).write(0);
            }
            sp.write(arg as u64); // x19
            sp.add(1).write(entry as usize as u64); // x20
            sp.add(11).write(thread_entry_stub as usize as u64); // x30
            ctx.sp = sp as u64;
        }
    }
}

/// x0 = prev, x1 = next
#[unsafe(naked)]
unsafe extern "C" fn switch_stacks(_prev: *mut Aarch64Context, _next: *const Aarch64Context) {
    naked_asm!(
        "sub sp, sp, #160",
        "stp x19, x20, [sp, #0]",
        "stp x21, x22, [sp, #16]",
        "stp x23, x24, [sp, #32]",
        "stp x25, x26, [sp, #48]",
        "stp x27, x28, [sp, #64]",
        "stp x29, x30, [sp, #80]",
        "stp d8, d9, [sp, #96]",
        "stp d10, d11, [sp, #112]",
        "stp d12, d13, [sp, #128]",
        "stp d14, d15, [sp, #144]",
        "mov x9, sp",
        "str x9, [x0]",
        "ldr x9, [x1]",
        "mov sp, x9",
        "ldp x19, x20, [sp, #0]",
        "ldp x21, x22, [sp, #16]",
        "ldp x23, x24, [sp, #32]",
        "ldp x25, x26, [sp, #48]",
        "ldp x27, x28, [sp, #64]",
        "ldp x29, x30, [sp, #80]",
        "ldp d8, d9, [sp, #96]",
        "ldp d10, d11, [sp, #112]",
        "ldp d12, d13, [sp, #128]",
        "ldp d14, d15, [sp, #144]",
        "add sp, sp, #160",
        "ret",
    )
}

/// First `ret` target of a prepared frame.
#[unsafe(naked)]
unsafe extern "C" fn thread_entry_stub() -> ! {
    naked_asm!(
        "mov x0, x19",
        "blr x20",
        "brk #0",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{Stack, StackSizeClass};

    extern "C" fn never_run(_arg: usize) -> ! {
        unreachable!()
    }

    #[test]
    fn test_prepared_frame_layout() {
        let stack = Stack::allocate(StackSizeClass::Small).unwrap();
        let mut ctx = Aarch64Context::default();

        unsafe {
            Aarch64Arch::prepare_context(&mut ctx, stack.stack_bottom(), never_run, 0xABCD);
        }

        let bottom = stack.stack_bottom() as u64;
        assert_eq!(ctx.sp, bottom - 160);

        let frame = ctx.sp as *const u64;
        unsafe {
            assert_eq!(*frame, 0xABCD);
            assert_eq!(*frame.add(1), never_run as usize as u64);
            assert_eq!(*frame.add(11), thread_entry_stub as usize as u64);
        }
    }
}
