//! Crate-level test suites that drive whole runs of a runtime.

mod helpers;
mod stress;

/// Sizes shared by the suites.
pub(crate) struct TestConfig {
    pub(crate) stress_thread_count: usize,
    pub(crate) stress_iterations: usize,
    pub(crate) property_cases: u64,
}

pub(crate) const TEST_CONFIG: TestConfig = TestConfig {
    stress_thread_count: 63,
    stress_iterations: 50,
    property_cases: 64,
};
