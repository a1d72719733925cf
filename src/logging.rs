//! Logging setup.
//!
//! Diagnostics go to stderr through `tracing`, leaving stdout for the report.
//! `RUST_LOG` takes precedence over the level chosen on the command line:
//!
//! ```bash
//! RUST_LOG=hashit=debug hashit ./data
//! RUST_LOG=hashit::hash::scan=trace hashit ./data
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber at `level` (error, warn, info, debug, trace)
///
/// Safe to call more than once; later calls are ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hashit={}", level)));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(level == "trace")
            .with_thread_names(level == "trace")
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
