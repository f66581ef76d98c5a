//! Tracing setup shared by the `hearth` binary and unit tests.
//!
//! Events go to stderr so they never interleave with command output on
//! stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber, quiet by default
///
/// Only warnings and errors are shown unless RUST_LOG asks for more.
pub fn init() {
    init_with_level("warn")
}

/// Install the global subscriber with `default_level` as the fallback filter
///
/// `default_level` takes any `EnvFilter` directive (`info`,
/// `hearth_core=debug`, ...). A RUST_LOG value, when set and valid, wins.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Route debug events into the test harness's captured output
///
/// Safe to call from every test; only the first call installs anything.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
