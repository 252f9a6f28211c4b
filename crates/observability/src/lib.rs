//! Process-wide logging setup shared by the three service binaries.

/// Initialize tracing for a service binary.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(service: &'static str) {
    tracing::init(service);
}

/// Subscriber construction (filter, output format).
pub mod tracing;
