//! Runtime configuration.

use crate::errors::ConfigError;
use crate::mem::StackSizeClass;

/// Default number of pool slots, including the bootstrap slot.
pub const DEFAULT_CAPACITY: usize = 10;

/// How the scheduler decides that a waiting parent may resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WakeStrategy {
    /// Read the per-thread live-child counter (O(1) per waiter)
    #[default]
    ChildCounters,
    /// Scan the whole pool for live children (O(N) per waiter)
    Rescan,
}

/// Configuration for a [`Runtime`](crate::Runtime).
///
/// ```
/// use cooperative_threads::{RuntimeConfig, StackSizeClass};
///
/// let config = RuntimeConfig::new()
///     .capacity(16)
///     .stack_size(StackSizeClass::Large);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    capacity: usize,
    stack_size: StackSizeClass,
    stack_canary: bool,
    wake_strategy: WakeStrategy,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            stack_size: StackSizeClass::Medium,
            stack_canary: true,
            wake_strategy: WakeStrategy::ChildCounters,
        }
    }

    /// Number of slots; slot 0 is taken by the bootstrap thread of a run.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn stack_size(mut self, size: StackSizeClass) -> Self {
        self.stack_size = size;
        self
    }

    /// Check the stack canary of every thread that is switched out.
    pub fn stack_canary(mut self, enabled: bool) -> Self {
        self.stack_canary = enabled;
        self
    }

    pub fn wake_strategy(mut self, strategy: WakeStrategy) -> Self {
        self.wake_strategy = strategy;
        self
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_stack_size(&self) -> StackSizeClass {
        self.stack_size
    }

    pub fn get_stack_canary(&self) -> bool {
        self.stack_canary
    }

    pub fn get_wake_strategy(&self) -> WakeStrategy {
        self.wake_strategy
    }

    /// Reject configurations no runtime can be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if u32::try_from(self.capacity).is_err() {
            return Err(ConfigError::CapacityTooLarge(self.capacity));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
