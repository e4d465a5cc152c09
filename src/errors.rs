//! Error handling for the cooperative threading runtime.
//!
//! Each public operation has its own error enum; all of them convert into
//! [`ThreadError`] so callers can propagate with `?` through a single type.
//! Joining a thread that has already finished is deliberately *not* an error.

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for threading operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Crate-wide error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// Thread creation errors
    Spawn(SpawnError),
    /// Thread joining errors
    Join(JoinError),
    /// Runtime start-up errors
    Run(RunError),
    /// Invalid runtime configuration
    Config(ConfigError),
}

/// Errors that can occur during thread creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Every slot of the thread pool is occupied
    PoolExhausted {
        /// Capacity of the pool that ran out of slots
        capacity: usize,
    },
    /// The stack for a fresh slot could not be allocated
    OutOfMemory,
    /// `create` was called while no thread of this runtime is running
    NotRunning,
}

/// Errors that can occur during thread joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// A thread tried to join itself
    WouldDeadlock,
    /// `join` was called while no thread of this runtime is running
    NotRunning,
}

/// Errors returned by [`Runtime::run`](crate::Runtime::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunError {
    /// The runtime is already executing threads
    AlreadyRunning,
    /// A previous run shut down with threads still allocated
    StaleThreads {
        /// Number of slots that are not free
        live: usize,
    },
    /// The bootstrap thread could not be created
    Spawn(SpawnError),
}

/// Invalid [`RuntimeConfig`](crate::RuntimeConfig) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The pool needs at least the bootstrap slot
    ZeroCapacity,
    /// Thread ids cannot address this many slots
    CapacityTooLarge(usize),
}

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Every thread exited
    Completed,
    /// Threads remain allocated but none of them can run
    Deadlocked,
}

/// Terminal record produced when no runnable thread remains.
///
/// The scheduler cannot tell a finished thread graph from a stuck one beyond
/// counting what is left, so both end the run; `reason` carries the diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shutdown {
    /// Diagnosis of the terminal condition
    pub reason: ShutdownReason,
    /// Slots still allocated at shutdown
    pub live: usize,
}

impl Shutdown {
    pub(crate) fn with_live(live: usize) -> Self {
        let reason = if live == 0 {
            ShutdownReason::Completed
        } else {
            ShutdownReason::Deadlocked
        };
        Self { reason, live }
    }

    /// `true` if every thread exited.
    pub fn is_completed(&self) -> bool {
        self.reason == ShutdownReason::Completed
    }

    /// Process exit code for this shutdown: 0 when completed, 2 when stuck.
    pub fn exit_code(&self) -> i32 {
        match self.reason {
            ShutdownReason::Completed => 0,
            ShutdownReason::Deadlocked => 2,
        }
    }

    /// End the hosting process with [`exit_code`](Self::exit_code).
    #[cfg(feature = "std-shim")]
    pub fn terminate(self) -> ! {
        extern crate std;
        std::process::exit(self.exit_code())
    }
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
            ThreadError::Join(e) => write!(f, "Thread join error: {}", e),
            ThreadError::Run(e) => write!(f, "Runtime start error: {}", e),
            ThreadError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::PoolExhausted { capacity } => {
                write!(f, "All {} thread slots are in use", capacity)
            }
            SpawnError::OutOfMemory => write!(f, "Out of memory for thread stack"),
            SpawnError::NotRunning => write!(f, "No thread of this runtime is running"),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::WouldDeadlock => write!(f, "A thread cannot join itself"),
            JoinError::NotRunning => write!(f, "No thread of this runtime is running"),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::AlreadyRunning => write!(f, "Runtime is already running"),
            RunError::StaleThreads { live } => {
                write!(f, "{} threads left over from a previous run", live)
            }
            RunError::Spawn(e) => write!(f, "Cannot create bootstrap thread: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroCapacity => write!(f, "Thread pool capacity must be at least 1"),
            ConfigError::CapacityTooLarge(capacity) => {
                write!(f, "Thread pool capacity too large: {}", capacity)
            }
        }
    }
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            ShutdownReason::Completed => write!(f, "all threads completed"),
            ShutdownReason::Deadlocked => {
                write!(f, "no runnable threads, {} still allocated", self.live)
            }
        }
    }
}

// Conversion implementations for ergonomic error handling

impl From<SpawnError> for ThreadError {
    fn from(error: SpawnError) -> Self {
        ThreadError::Spawn(error)
    }
}

impl From<JoinError> for ThreadError {
    fn from(error: JoinError) -> Self {
        ThreadError::Join(error)
    }
}

impl From<RunError> for ThreadError {
    fn from(error: RunError) -> Self {
        ThreadError::Run(error)
    }
}

impl From<ConfigError> for ThreadError {
    fn from(error: ConfigError) -> Self {
        ThreadError::Config(error)
    }
}
