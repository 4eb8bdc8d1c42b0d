//! Log output for hosts without a subscriber of their own
//!
//! The engine reports through [`tracing`]. Filtering follows `RUST_LOG`, e.g.
//! `RUST_LOG=trellis=debug` shows every context change as a list of JSON patch operations.
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install a global fmt subscriber
///
/// Calling this more than once, or after another subscriber was installed, does nothing.
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .with(EnvFilter::from_default_env())
            .try_init()
            .unwrap_or(())
    });
}
