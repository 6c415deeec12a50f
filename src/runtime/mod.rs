//! Anything related to the broker's runtime — not business logic.

mod config;
pub use config::{
	Config,
	DatabaseEntry,
	DataSourceConfig,
	DbConfig,
	LoggingConfig,
	PoolConfig,
	RestConfig,
	RouteConfig,
	RouterConfig,
	RpcConfig,
	RpcExceptionConfig,
	ServerConfig,
};

mod context;
pub use context::ServerContext;

/// Builds the dedicated multi-threaded Tokio runtime the server runs on.
pub fn build() -> std::io::Result<tokio::runtime::Runtime>
{
	tokio::runtime::Builder::new_multi_thread().enable_all().thread_name("dsbroker-worker").build()
}
