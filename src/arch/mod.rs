//! Architecture abstraction layer for context switching.
//!
//! Everything non-portable about suspending one thread and resuming another
//! lives behind the [`Arch`] trait. The scheduler only ever asks for two
//! things: build the first frame of a fresh thread, and swap the running
//! context for a saved one.

/// Entry point of a freshly prepared context. Receives the `arg` given to
/// [`Arch::prepare_context`] and never returns.
pub type ThreadEntry = extern "C" fn(usize) -> !;

/// Architecture abstraction trait.
///
/// # Contract
///
/// [`context_switch`](Arch::context_switch) must preserve, for the thread that
/// is switched out, every register the platform C ABI defines as callee-saved
/// plus the stack pointer. Caller-saved registers need not survive: the switch
/// is an ordinary function call from the point of view of the compiler.
/// Floating point control/status words are not switched.
pub trait Arch {
    /// Architecture-specific saved context type.
    type SavedContext: Default;

    /// Save the running context into `prev` and resume `next`.
    ///
    /// Returns when some later switch names `prev` as its `next`.
    ///
    /// # Safety
    ///
    /// - `prev` must be valid for writes and `next` valid for reads
    /// - `next` must hold a context saved by an earlier switch, or one built by
    ///   [`prepare_context`](Arch::prepare_context) whose stack is still alive
    /// - no lock guarding either context may be held across the call
    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext);

    /// Build the initial frame for a thread that has never run.
    ///
    /// The first switch into `ctx` calls `entry(arg)` with the stack pointer at
    /// `stack_bottom` (rounded down to 16 bytes) and an ABI-conformant frame.
    ///
    /// # Safety
    ///
    /// `stack_bottom` must be the high end of a writable region large enough
    /// for the initial frame plus everything `entry` will use.
    unsafe fn prepare_context(
        ctx: &mut Self::SavedContext,
        stack_bottom: *mut u8,
        entry: ThreadEntry,
        arg: usize,
    );
}

#[cfg(all(target_arch = "x86_64", not(windows)))]
pub mod x86_64;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(all(target_arch = "x86_64", not(windows)))]
pub use self::x86_64::X86_64Arch as DefaultArch;

#[cfg(target_arch = "aarch64")]
pub use self::aarch64::Aarch64Arch as DefaultArch;

#[cfg(not(any(all(target_arch = "x86_64", not(windows)), target_arch = "aarch64")))]
compile_error!("cooperative-threads supports x86_64 (System V) and aarch64 targets only.");
