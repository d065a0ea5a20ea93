// crates.io
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber: `RUST_LOG` filtering (default `info`) with a human or JSON
/// formatter.
pub fn init_logging(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let registry = tracing_subscriber::registry().with(filter);

	if json {
		registry.with(fmt::layer().json().with_current_span(true)).init();
	} else {
		registry.with(fmt::layer().with_target(false)).init();
	}
}
