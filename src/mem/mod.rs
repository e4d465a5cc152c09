//! Memory management for thread stacks.

pub mod stack;

pub use stack::{Stack, StackSizeClass, STACK_CANARY};
