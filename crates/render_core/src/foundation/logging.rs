//! Logging utilities
//!
//! The crate logs through the `log` facade. Hosts pick a backend; these
//! helpers wire up `env_logger` for binaries and tests.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default filter, still overridable by `RUST_LOG`.
///
/// Returns false when a logger was already installed.
pub fn init_with_level(level: log::LevelFilter) -> bool {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()
        .is_ok()
}

/// Route log output through the test harness; safe to call from every test
#[cfg(test)]
pub(crate) fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
