//! x86_64 (System V) context switching.
//!
//! The callee-saved registers are pushed onto the outgoing thread's own stack;
//! the saved context is just the resulting stack pointer.

use super::{Arch, ThreadEntry};
use core::arch::naked_asm;

/// Saved thread context for x86_64.
///
/// `rsp` points at `r15, r14, r13, r12, rbx, rbp, return address`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct X86_64Context {
    pub rsp: u64,
}

/// x86_64 architecture implementation.
pub struct X86_64Arch;

impl Arch for X86_64Arch {
    type SavedContext = X86_64Context;

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
            let sp = frame_end.sub(7);
            sp.write(0); // r15
            sp.add(1).write(0); // r14
            sp.add(2).write(entry as usize as u64); // r13
            sp.add(3).write(arg as u64); // r12
            sp.add(4).write(0); // rbx
            sp.add(5).write(0); // rbp
            sp.add(6).write(thread_entry_stub as usize as u64);
            ctx.rsp = sp as u64;
        }
    }
}

/// rdi = prev, rsi = next
#[unsafe(naked)]
unsafe extern "C" fn switch_stacks(_prev: *mut X86_64Context, _next: *const X86_64Context) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, [rsi]",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}

/// First return target of a prepared frame. rsp is 16-byte aligned here, so
/// the `call` leaves `entry` with the alignment the ABI expects.
#[unsafe(naked)]
unsafe extern "C" fn thread_entry_stub() -> ! {
    naked_asm!(
        "mov rdi, r12",
        "call r13",
        "ud2",
    )
}
