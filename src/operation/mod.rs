//! One transaction operation's lifecycle (spec §4.5).

mod error;
pub use error::{OperationError, OperationResult};

pub mod ds;
pub use ds::DsOperationRunner;

pub mod rpc;
pub use rpc::{RpcObject, RpcObjectRegistry, RpcOperationRunner};

use dsbroker_wire::{OperationKind, Response};

use crate::datasource::DataSourcePool;

/// Either lifecycle, selected once at parse time (spec §4.6: a DS operation
/// "is a plain object with `appID` and `operation`"; anything else is RPC).
/// A closed enum, not `dyn Operation`, per Design Notes §9 — the kind never
/// changes after the envelope is parsed.
pub enum Operation
{
	DataSource(DsOperationRunner),
	Rpc(RpcOperationRunner),
}

impl Operation
{
	pub fn new(kind: OperationKind) -> Self
	{
		match kind {
			OperationKind::DataSource(spec) => Self::DataSource(DsOperationRunner::new(spec)),
			OperationKind::Rpc(spec) => Self::Rpc(RpcOperationRunner::new(spec)),
		}
	}

	pub async fn init(&mut self, data_source_pool: &DataSourcePool, rpc_registry: &RpcObjectRegistry) -> OperationResult<()>
	{
		match self {
			Self::DataSource(runner) => runner.init(data_source_pool).await,
			Self::Rpc(runner) => runner.init(rpc_registry).await,
		}
	}

	pub async fn execute(&mut self, strict_sql_filtering: bool) -> Response
	{
		match self {
			Self::DataSource(runner) => runner.execute(strict_sql_filtering).await,
			Self::Rpc(runner) => runner.execute().await,
		}
	}

	pub async fn free(&mut self, data_source_pool: &DataSourcePool)
	{
		match self {
			Self::DataSource(runner) => runner.free(data_source_pool).await,
			Self::Rpc(runner) => runner.free().await,
		}
	}
}
