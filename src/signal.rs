//! Listens for an OS shutdown signal, grounded on `cs2kz-api`'s `signal.rs`.

use std::error::Error;

/// Resolves once SIGINT or (on Unix) SIGTERM is received.
pub(crate) async fn shutdown()
{
	tokio::select! {
		ctrl_c_result = tokio::signal::ctrl_c() => match ctrl_c_result {
			Ok(()) => tracing::debug!("received SIGINT"),
			Err(error) => tracing::error!(error = &error as &dyn Error, "failed listening for SIGINT"),
		},

		() = platform_specific_shutdown() => {},
	}
}

#[cfg(unix)]
async fn platform_specific_shutdown()
{
	use tokio::signal::unix::{signal, SignalKind};

	match signal(SignalKind::terminate()) {
		Ok(mut signal) => match signal.recv().await {
			Some(()) => tracing::debug!("received SIGTERM"),
			None => tracing::warn!("cannot receive more SIGTERM signals"),
		},
		Err(error) => tracing::error!(error = &error as &dyn Error, "failed listening for SIGTERM"),
	}
}

#[cfg(not(unix))]
async fn platform_specific_shutdown()
{
	std::future::pending().await
}
