//! Tracing setup.

use std::io;

use tracing::dispatcher::DefaultGuard;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer};

/// Log to stdout at `level` and above for as long as the returned guard
/// lives.  Scoped to the current thread, so tests can install their own.
pub fn init_std_out_logging(level: LevelFilter) -> DefaultGuard {
    let collector = tracing_subscriber::registry().with(
        fmt::Layer::new()
            .with_writer(io::stdout)
            .with_target(false)
            .with_filter(level),
    );
    tracing::subscriber::set_default(collector)
}
