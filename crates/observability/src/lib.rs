//! Process-wide tracing/logging setup.

/// Initialize observability for the process.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;
