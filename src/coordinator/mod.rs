//! The `TransactionCoordinator`: runs one transaction's operations through
//! init/execute/free (spec §4.5).

mod error;
pub use error::CoordinatorError;

use dsbroker_wire::{Response, Transaction};

use crate::datasource::DataSourcePool;
use crate::operation::{Operation, RpcObjectRegistry};

/// Owns one transaction's operations and drives them through the three
/// phases in spec §4.5's table.
pub struct TransactionCoordinator
{
	operations: Vec<Operation>,
}

impl TransactionCoordinator
{
	pub fn new(transaction: Transaction) -> Self
	{
		let operations = transaction.operations.into_iter().map(|raw| Operation::new(raw.kind)).collect();
		Self { operations }
	}

	/// Runs `init` (sequential, stops on first error), then `execute`
	/// (sequential, runs every operation regardless of earlier failures),
	/// then `free` (sequential, best-effort).
	///
	/// "If `init` fails, `free` is still run for any operation that was
	/// already initialised, and the coordinator surfaces a single top-level
	/// error (no per-operation responses)" (spec §4.5).
	pub async fn execute(
		&mut self,
		data_source_pool: &DataSourcePool,
		rpc_registry: &RpcObjectRegistry,
		strict_sql_filtering: bool,
	) -> Result<Vec<Response>, CoordinatorError>
	{
		let mut initialised = 0;
		for i in 0..self.operations.len() {
			match self.operations[i].init(data_source_pool, rpc_registry).await {
				Ok(()) => initialised += 1,
				Err(error) => {
					for j in 0..initialised {
						self.operations[j].free(data_source_pool).await;
					}
					return Err(CoordinatorError::Init(error));
				},
			}
		}

		let mut responses = Vec::with_capacity(self.operations.len());
		for i in 0..self.operations.len() {
			responses.push(self.operations[i].execute(strict_sql_filtering).await);
		}

		for i in 0..self.operations.len() {
			self.operations[i].free(data_source_pool).await;
		}

		Ok(responses)
	}
}

#[cfg(test)]
mod tests
{
	use std::collections::HashMap;
	use std::sync::Arc;

	use dsbroker_wire::Status;

	use super::*;
	use crate::database::{ConnectionPool, SqlDialect};
	use crate::runtime::{DataSourceConfig, DatabaseEntry, DbConfig, PoolConfig};

	async fn fixture() -> (tempfile::TempDir, Arc<ConnectionPool>, DataSourcePool)
	{
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(
			dir.path().join("widget.ds.js"),
			r#"{"ID":"widget","serverType":"sql","fields":[
				{"name":"id","type":"sequence","primaryKey":true},
				{"name":"name","type":"text"}
			]}"#,
		)
		.unwrap();

		let mut databases = HashMap::new();
		databases.insert(
			"default".to_owned(),
			DatabaseEntry { db_type: SqlDialect::Sqlite, factory: None, connection: "sqlite::memory:".into(), pool: PoolConfig::default() },
		);
		let db_config = Arc::new(DbConfig { default_database: Some("default".into()), databases });
		let connection_pool = Arc::new(ConnectionPool::new(db_config));

		{
			let mut conn = connection_pool.acquire(None).await.unwrap();
			sqlx::query("CREATE TABLE widget (id INTEGER PRIMARY KEY, name TEXT)").execute(conn.as_raw()).await.unwrap();
			connection_pool.release(None, conn).await.unwrap();
		}

		let ds_config = Arc::new(DataSourceConfig { path: dir.path().to_owned(), strict_sql_filtering: false, pool: PoolConfig::default() });
		let data_source_pool = DataSourcePool::new(ds_config, Arc::clone(&connection_pool));

		(dir, connection_pool, data_source_pool)
	}

	fn transaction_with(operations: Vec<serde_json::Value>) -> Transaction
	{
		serde_json::from_value(serde_json::json!({ "operations": operations })).unwrap()
	}

	/// Scenario 3: update by missing PK is a single-operation failure; no
	/// SQL is issued, and the transaction is rolled back (spec §8).
	#[tokio::test]
	async fn scenario_3_update_by_missing_pk_fails_without_touching_the_backend()
	{
		let (_dir, _pool, ds_pool) = fixture().await;
		let registry = RpcObjectRegistry::new();
		let txn = transaction_with(vec![serde_json::json!({
			"appID": "builtinApp",
			"operation": "widget_update",
			"criteria": {},
			"values": { "name": "renamed" },
		})]);

		let mut coordinator = TransactionCoordinator::new(txn);
		let responses = coordinator.execute(&ds_pool, &registry, false).await.unwrap();

		assert_eq!(responses.len(), 1);
		assert_eq!(responses[0].status, Status::Failure);
	}

	/// Scenario 5: a batch with one success and one failure still returns
	/// one slot per operation, in order (spec §8).
	#[tokio::test]
	async fn scenario_5_batch_continues_after_a_failed_operation()
	{
		let (_dir, _pool, ds_pool) = fixture().await;
		let registry = RpcObjectRegistry::new();
		let txn = transaction_with(vec![
			serde_json::json!({ "appID": "builtinApp", "operation": "widget_fetch" }),
			serde_json::json!({
				"appID": "builtinApp",
				"operation": "widget_update",
				"criteria": { "id": 999 },
				"values": { "name": "nope" },
			}),
		]);

		let mut coordinator = TransactionCoordinator::new(txn);
		let responses = coordinator.execute(&ds_pool, &registry, false).await.unwrap();

		assert_eq!(responses.len(), 2);
		assert_eq!(responses[0].status, Status::Success);
		assert_eq!(responses[1].status, Status::Failure);
	}

	/// Scenario 6: the two sentinel strings each produce a successful RPC
	/// response, preserving order (spec §8).
	#[tokio::test]
	async fn scenario_6_sentinel_rpc_operations_echo_their_payload()
	{
		let (_dir, _pool, ds_pool) = fixture().await;
		let registry = RpcObjectRegistry::new();
		let txn = transaction_with(vec![
			serde_json::json!(dsbroker_wire::SENTINEL_NULL),
			serde_json::json!(dsbroker_wire::SENTINEL_EMPTY_STRING),
		]);

		let mut coordinator = TransactionCoordinator::new(txn);
		let responses = coordinator.execute(&ds_pool, &registry, false).await.unwrap();

		assert_eq!(responses.len(), 2);
		assert_eq!(responses[0].status, Status::Success);
		assert_eq!(responses[0].data, serde_json::Value::Null);
		assert_eq!(responses[1].status, Status::Success);
		assert_eq!(responses[1].data, serde_json::Value::String(String::new()));
	}

	/// A successful add on a sequence-PK SQL data source returns a record
	/// whose PK is non-null (spec §8's quantified add invariant).
	#[tokio::test]
	async fn add_populates_the_generated_sequence_pk()
	{
		let (_dir, _pool, ds_pool) = fixture().await;
		let registry = RpcObjectRegistry::new();
		let txn = transaction_with(vec![serde_json::json!({
			"appID": "builtinApp",
			"operation": "widget_add",
			"values": { "name": "sprocket" },
		})]);

		let mut coordinator = TransactionCoordinator::new(txn);
		let responses = coordinator.execute(&ds_pool, &registry, false).await.unwrap();

		assert_eq!(responses.len(), 1);
		assert_eq!(responses[0].status, Status::Success);
		let id = responses[0].data.get("id").and_then(serde_json::Value::as_i64);
		assert!(id.is_some_and(|id| id > 0));
	}
}
