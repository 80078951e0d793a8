//! Logging and tracing infrastructure for heft.
//!
//! Diagnostics go to stderr through the tracing crate so that stdout stays
//! reserved for the ranked tables.

use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber.
///
/// This should be called once at program startup; subsequent calls are
/// ignored. The filter comes from `RUST_LOG`, defaulting to `info`, and
/// `verbose` lowers the default to `debug`.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let default = if verbose { "debug" } else { "info" };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_once() {
        // Callable multiple times without panic.
        init_tracing(false);
        init_tracing(true);
    }
}
