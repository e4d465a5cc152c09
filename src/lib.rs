#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Cooperative user-level threads with real stack switching.
//!
//! A [`Runtime`] multiplexes a fixed pool of threads onto the host thread
//! that calls [`Runtime::run`]. Each thread has its own stack; switching
//! between them saves and restores the callee-saved registers and the stack
//! pointer. Threads run until they yield, join or exit, and the scheduler
//! always resumes the lowest-numbered runnable slot.
//!
//! # Target Platform
//!
//! - **x86_64** with the System V calling convention (Linux, macOS, BSDs)
//! - **aarch64** with the AAPCS64 calling convention
//!
//! # Features
//!
//! - `std-shim`: [`Shutdown::terminate`] ends the process with the run's
//!   exit code
//!
//! # Quick Start
//!
//! ```
//! use cooperative_threads::{DefaultRuntime, RuntimeConfig};
//!
//! let runtime = DefaultRuntime::new(RuntimeConfig::default()).unwrap();
//!
//! let shutdown = runtime
//!     .run(|rt| {
//!         let children: Vec<_> = (0..3)
//!             .map(|n| {
//!                 rt.create(move |rt| {
//!                     for _ in 0..n {
//!                         rt.yield_now();
//!                     }
//!                 })
//!                 .unwrap()
//!             })
//!             .collect();
//!
//!         for child in children {
//!             rt.join(child).unwrap();
//!         }
//!     })
//!     .unwrap();
//!
//! assert!(shutdown.is_completed());
//! assert_eq!(shutdown.exit_code(), 0);
//! ```
//!
//! # Architecture
//!
//! - [`arch`]: register save/restore and initial frames per CPU
//! - [`thread`]: thread ids, states and the slot table
//! - [`sched`]: wake-up and pick-next policy
//! - [`runtime`]: run, create, join, yield and exit

// Core modules
pub mod arch;
pub mod config;
pub mod errors;
pub mod mem;
pub mod runtime;
pub mod sched;
pub mod thread;

#[cfg(test)]
extern crate std;

extern crate alloc;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{Arch, DefaultArch};

// Runtime
pub use config::{RuntimeConfig, WakeStrategy};
pub use runtime::{DefaultRuntime, Runtime, SchedStats};

// Scheduler
pub use sched::{DefaultScheduler, IndexScanScheduler, Scheduler};

// Threads
pub use thread::{ThreadCounts, ThreadId, ThreadState, ThreadTable};

// Memory management
pub use mem::{Stack, StackSizeClass};

// Errors
pub use errors::{
    ConfigError, JoinError, RunError, Shutdown, ShutdownReason, SpawnError, ThreadError,
    ThreadResult,
};
