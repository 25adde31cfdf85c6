//! Logging setup and tracing prelude
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("connected");
//! debug!(events = 3, "refreshed snapshot");
//! ```

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// Logs at INFO and above by default. Control the level with `RUST_LOG`:
///
/// ```bash
/// RUST_LOG=debug boinc-rpc tasks
/// RUST_LOG=boinc_rpc::wire=trace boinc-rpc projects
/// ```
///
/// Output goes to stderr so command output on stdout stays machine-readable.
pub fn init_tracing() {
	init_tracing_with_default("info");
}

/// Like [`init_tracing`], with an explicit fallback filter for when
/// `RUST_LOG` is unset.
pub fn init_tracing_with_default(default_filter: &str) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
		)
		.with_writer(std::io::stderr)
		.init();
}
