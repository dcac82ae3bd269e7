//! Tracing initialization for the binaries.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Install the global subscriber. `filter` uses `EnvFilter` directive syntax,
/// e.g. `taskflow=debug`; an unparsable filter falls back to `taskflow=info`.
///
/// Only the first call has any effect.
pub fn init_tracing(filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("taskflow=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
