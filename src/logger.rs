//! Diagnostics go to stderr through `tracing`; stdout carries only JSON
//! output from the CLI.

use std::io;
use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "CHANGESCOPE_LOG";

static INIT: Once = Once::new();

/// Default directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "changescope=warn",
        1 => "changescope=info",
        2 => "changescope=debug",
        _ => "changescope=trace",
    }
}

/// Install the global subscriber. `CHANGESCOPE_LOG` wins over `verbosity`.
/// Later calls are no-ops.
pub fn init(verbosity: u8, json: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        } else {
            registry
                .with(fmt::layer().with_target(false).with_writer(io::stderr))
                .init();
        }
    });
}
