//! DS operation lifecycle (spec §4.5.1).

use dsbroker_wire::{DsOperationSpec, OperationType, Response, Status};

use super::error::OperationResult;
use crate::datasource::{DataSourceError, DataSourcePool, ExecuteOutcome, PooledDataSource, Record};

/// Runs one DS operation through acquire/execute/free (spec §4.5.1).
pub struct DsOperationRunner
{
	spec: DsOperationSpec,
	pooled: Option<PooledDataSource>,
}

impl DsOperationRunner
{
	pub fn new(spec: DsOperationSpec) -> Self
	{
		Self { spec, pooled: None }
	}

	/// "acquire DataSource by `dataSourceName`; the DataSource then acquires
	/// a Connection" (spec §4.5.1). A failure here is not caught per-operation
	/// — the coordinator aborts the whole batch on `init` failure (spec §4.5).
	pub async fn init(&mut self, data_source_pool: &DataSourcePool) -> OperationResult<()>
	{
		let mut pooled = data_source_pool.acquire(&self.spec.data_source_name).await?;
		pooled.instance().init(data_source_pool.connection_pool()).await?;
		self.pooled = Some(pooled);
		Ok(())
	}

	/// "`startTransaction`; call `DataSource.execute()` …  If it fails →
	/// `rollback`, emit a DS response wrapping the error. If it succeeds →
	/// `commit`. If commit fails → rollback, emit response with status `-10`.
	/// On `rollback` failure, log only" (spec §4.5.1).
	pub async fn execute(&mut self, strict_sql_filtering: bool) -> Response
	{
		let Some(pooled) = self.pooled.as_mut() else {
			return ds_failure(Status::Failure, "data source was not initialised");
		};
		let instance = pooled.instance();

		if let Err(error) = instance.start_transaction().await {
			return ds_failure(Status::Failure, &error.to_string());
		}

		let outcome = match self.spec.operation_type {
			OperationType::Fetch => instance.execute_fetch(&self.spec, strict_sql_filtering).await,
			OperationType::Add => instance.execute_add(&self.spec).await,
			OperationType::Update => instance.execute_update(&self.spec).await,
			OperationType::Remove => instance.execute_remove(&self.spec).await,
			OperationType::Custom => Err(DataSourceError::Unimplemented),
		};

		match outcome {
			Ok(outcome) => match instance.commit().await {
				Ok(()) => outcome_to_response(outcome),
				Err(error) => {
					if let Err(rollback_error) = instance.rollback().await {
						tracing::warn!(%rollback_error, "rollback after commit failure also failed");
					}
					ds_failure(Status::TransactionFailed, &error.to_string())
				},
			},
			Err(error) => {
				if let Err(rollback_error) = instance.rollback().await {
					tracing::warn!(%rollback_error, "rollback after execute failure also failed");
				}
				ds_failure(Status::Failure, &error.to_string())
			},
		}
	}

	/// "release DataSource back to the pool (which releases its connection)"
	/// (spec §4.5.1).
	pub async fn free(&mut self, data_source_pool: &DataSourcePool)
	{
		if let Some(pooled) = self.pooled.take() {
			data_source_pool.release(pooled).await;
		}
	}
}

fn outcome_to_response(outcome: ExecuteOutcome) -> Response
{
	match outcome {
		ExecuteOutcome::Fetch { rows, start_row, end_row, total_rows } => {
			let data = serde_json::Value::Array(rows.into_iter().map(record_to_json).collect());
			Response::ds_success(data, dsbroker_wire::DsResponseExtra {
				start_row,
				end_row,
				total_rows,
				affected_rows: total_rows,
				..Default::default()
			})
		},
		ExecuteOutcome::Row(row) => {
			Response::ds_success(record_to_json(row), dsbroker_wire::DsResponseExtra { affected_rows: 1, ..Default::default() })
		},
	}
}

fn record_to_json(row: Record) -> serde_json::Value
{
	serde_json::Value::Object(row.into_iter().map(|(k, v)| (k, serde_json::Value::from(v))).collect())
}

fn ds_failure(status: Status, message: &str) -> Response
{
	Response::ds_failure(status, serde_json::Value::String(message.to_owned()), dsbroker_wire::DsResponseExtra::default())
}
