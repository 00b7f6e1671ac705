//! Diagnostic logging to stderr.
//!
//! Default level is `warn` so report output stays clean; `--verbose` turns on
//! `debug` for this crate and `RUST_LOG` overrides both.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,cloud_doctor=debug"
    } else {
        "warn"
    }
}

pub fn init(verbose: bool, ansi: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // a subscriber may already be installed (tests); keep it
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_ansi(ansi),
        )
        .try_init();
}
