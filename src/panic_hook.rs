//! Logs panics through `tracing` instead of letting them fall through to
//! stderr, grounded on `cs2kz-api`'s `panic_hook::install` (simplified here:
//! this server has no multi-environment distinction to branch on).

use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic;

pub fn install()
{
	let default_hook = panic::take_hook();
	panic::set_hook(Box::new(move |panic_info| {
		let backtrace = Backtrace::capture();
		if backtrace.status() == BacktraceStatus::Captured {
			tracing::error!(target: "dsbroker::panics", %backtrace, "thread panicked: {panic_info}");
		} else {
			tracing::error!(target: "dsbroker::panics", "thread panicked: {panic_info}");
		}
		default_hook(panic_info);
	}));
}
