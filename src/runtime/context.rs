//! `ServerContext`: the shared, process-wide state every request handler
//! needs (Design Notes §9: "a `ServerContext` struct holds the pools and
//! registries — no global mutable statics").

use std::sync::Arc;

use crate::database::ConnectionPool;
use crate::datasource::DataSourcePool;
use crate::operation::RpcObjectRegistry;
use crate::runtime::Config;

/// Cloned into every axum handler via [`axum::extract::State`]; cheap to
/// clone since every field is already an `Arc`.
#[derive(Clone)]
pub struct ServerContext
{
	pub config: Arc<Config>,
	pub connection_pool: Arc<ConnectionPool>,
	pub data_source_pool: Arc<DataSourcePool>,
	pub rpc_objects: Arc<RpcObjectRegistry>,
}

impl ServerContext
{
	pub fn new(config: Config) -> Self
	{
		let connection_pool = Arc::new(ConnectionPool::new(Arc::new(config.db.clone())));
		let data_source_pool =
			Arc::new(DataSourcePool::new(Arc::new(config.data_source.clone()), Arc::clone(&connection_pool)));

		Self { config: Arc::new(config), connection_pool, data_source_pool, rpc_objects: Arc::new(RpcObjectRegistry::new()) }
	}
}
