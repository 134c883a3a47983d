#![allow(dead_code)]

#[cfg(unix)]
pub mod fake_hg;
pub mod fixtures;

use tracing_subscriber::EnvFilter;

/// Route getter logs to the test harness; `RUST_LOG` overrides the filter.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
