//! `serverType: "generic"` (spec §4.3): a real, testable configuration whose
//! every operation is simply unimplemented, rather than a dead enum arm.

use dsbroker_wire::DsOperationSpec;

use super::descriptor::DataSourceDescriptor;
use super::error::DataSourceResult;
use super::{DataSourceError, ExecuteOutcome};

/// Matches the behaviour spec §4.3 describes for a subclass that "did not
/// override the chosen type": every `executeX` returns [`DataSourceError::Unimplemented`].
#[derive(Debug)]
pub struct GenericDataSource
{
	descriptor: DataSourceDescriptor,
}

impl GenericDataSource
{
	pub fn new(descriptor: DataSourceDescriptor) -> Self
	{
		Self { descriptor }
	}

	pub fn descriptor(&self) -> &DataSourceDescriptor
	{
		&self.descriptor
	}

	pub async fn execute_fetch(&mut self, _op: &DsOperationSpec, _strict_sql_filtering: bool) -> DataSourceResult<ExecuteOutcome>
	{
		Err(DataSourceError::Unimplemented)
	}

	pub async fn execute_add(&mut self, _op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		Err(DataSourceError::Unimplemented)
	}

	pub async fn execute_update(&mut self, _op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		Err(DataSourceError::Unimplemented)
	}

	pub async fn execute_remove(&mut self, _op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		Err(DataSourceError::Unimplemented)
	}
}

#[cfg(test)]
mod tests
{
	use dsbroker_wire::OperationType;

	use super::*;
	use crate::datasource::descriptor::ServerType;

	fn descriptor() -> DataSourceDescriptor
	{
		DataSourceDescriptor {
			id: "placeholder".into(),
			server_type: ServerType::Generic,
			fields: Vec::new(),
			table_name: None,
			db_name: None,
			file_name: None,
			json_prefix: None,
			json_suffix: None,
		}
	}

	fn op() -> DsOperationSpec
	{
		DsOperationSpec {
			app_id: None,
			data_source_name: "placeholder".into(),
			operation_type: OperationType::Fetch,
			text_match_style: None,
			data: serde_json::Value::Null,
			advanced_criteria: None,
			simple_criteria: None,
			values: serde_json::Map::new(),
			old_values: serde_json::Map::new(),
			sort_by: Vec::new(),
			start_row: None,
			end_row: None,
			component_id: None,
		}
	}

	#[tokio::test]
	async fn every_operation_is_unimplemented()
	{
		let mut ds = GenericDataSource::new(descriptor());
		let op = op();

		assert!(matches!(ds.execute_fetch(&op, false).await, Err(DataSourceError::Unimplemented)));
		assert!(matches!(ds.execute_add(&op).await, Err(DataSourceError::Unimplemented)));
		assert!(matches!(ds.execute_update(&op).await, Err(DataSourceError::Unimplemented)));
		assert!(matches!(ds.execute_remove(&op).await, Err(DataSourceError::Unimplemented)));
	}
}
