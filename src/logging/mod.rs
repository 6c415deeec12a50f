//! `tracing-subscriber` setup (spec §6 `logging.*`), grounded on
//! `cs2kz-api`'s `telemetry::init`.

use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use crate::runtime::LoggingConfig;

/// Installs the global `tracing` subscriber. `RUST_LOG`, if set, takes
/// precedence over `logging.level`.
pub fn init(config: &LoggingConfig)
{
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

	tracing_subscriber::fmt()
		.with_file(true)
		.with_line_number(true)
		.with_timer(UtcTime::rfc_3339())
		.with_env_filter(filter)
		.init();
}
