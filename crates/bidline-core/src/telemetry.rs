//! Tracing setup for the bidline binary.
//!
//! Without `RUST_LOG`, only bidline's own crates log at the requested level;
//! everything else is held at `warn`. Logs go to stderr so that labels and
//! JSON written to stdout can be piped.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const OWN_CRATES: [&str; 3] = ["bidline", "bidline_core", "adserver_state"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let own = OWN_CRATES.map(|c| format!("{c}={level}"));
    format!("warn,{}", own.join(","))
}

/// Install the global subscriber. Only the first call in a process has any
/// effect.
///
/// * `json`: newline-delimited JSON instead of human-readable lines.
/// * `level`: verbosity for bidline's crates when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}
