//! `serverType: "json"` (spec §4.3.2): a JSON file treated as a flat table.

use std::path::PathBuf;

use dsbroker_wire::{DsOperationSpec, Value};

use super::descriptor::DataSourceDescriptor;
use super::error::{DataSourceError, DataSourceResult};
use super::{ExecuteOutcome, Record};

/// Backs its data with a JSON file at `<dataSource.path>/<fileName>` (spec
/// §4.3.2). Fetch is unfiltered and unpaged; add/update/remove rewrite the
/// whole file — an explicit limitation, not an oversight.
#[derive(Debug)]
pub struct JsonFileDataSource
{
	descriptor: DataSourceDescriptor,
	path: PathBuf,
	rows: Option<Vec<Record>>,
}

impl JsonFileDataSource
{
	pub fn new(descriptor: DataSourceDescriptor, data_source_path: &std::path::Path) -> Self
	{
		let file_name = descriptor.file_name.clone().unwrap_or_else(|| format!("{}.json", descriptor.id));
		let path = data_source_path.join(file_name);
		Self { descriptor, path, rows: None }
	}

	pub fn descriptor(&self) -> &DataSourceDescriptor
	{
		&self.descriptor
	}

	/// Loads the backing file, treating a missing file as an empty list
	/// (spec §4.3.2).
	pub async fn init(&mut self) -> DataSourceResult<()>
	{
		let rows = match tokio::fs::read(&self.path).await {
			Ok(bytes) => {
				let raw: Vec<serde_json::Map<String, serde_json::Value>> =
					serde_json::from_slice(&bytes).map_err(|e| DataSourceError::DescriptorParseError {
						id: self.descriptor.id.clone(),
						reason: e.to_string(),
					})?;
				raw.into_iter()
					.map(|obj| self.descriptor.fields.iter().map(|f| (f.name.clone(), Value::from(obj.get(&f.name).cloned().unwrap_or(serde_json::Value::Null)))).collect())
					.collect()
			},
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
			Err(error) => return Err(DataSourceError::Io(error)),
		};
		self.rows = Some(rows);
		Ok(())
	}

	pub async fn start_transaction(&mut self) -> DataSourceResult<()>
	{
		Ok(())
	}

	pub async fn commit(&mut self) -> DataSourceResult<()>
	{
		Ok(())
	}

	pub async fn rollback(&mut self) -> DataSourceResult<()>
	{
		Ok(())
	}

	pub async fn free_resources(&mut self)
	{
		self.rows = None;
	}

	fn rows(&self) -> &[Record]
	{
		self.rows.as_deref().expect("JsonFileDataSource executed before init")
	}

	fn rows_mut(&mut self) -> &mut Vec<Record>
	{
		self.rows.as_mut().expect("JsonFileDataSource executed before init")
	}

	async fn persist(&self) -> DataSourceResult<()>
	{
		let as_json: Vec<serde_json::Value> = self
			.rows()
			.iter()
			.map(|row| serde_json::Value::Object(row.iter().map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone()))).collect()))
			.collect();
		let bytes = serde_json::to_vec_pretty(&as_json).expect("JSON records always serialise");
		tokio::fs::write(&self.path, bytes).await.map_err(DataSourceError::Io)
	}

	fn pk_matches(&self, row: &Record, pk: &[(String, Value)]) -> bool
	{
		pk.iter().all(|(name, value)| row.get(name) == Some(value))
	}

	fn extract_pk(&self, op: &DsOperationSpec) -> DataSourceResult<Vec<(String, Value)>>
	{
		self.descriptor
			.pk_fields()
			.map(|f| {
				let raw = op
					.simple_criteria
					.as_ref()
					.and_then(|m| m.get(&f.name))
					.or_else(|| op.values.get(&f.name))
					.filter(|v| !v.is_null());
				raw.map(|v| (f.name.clone(), Value::from(v.clone())))
					.ok_or_else(|| DataSourceError::MissingPrimaryKey(f.name.clone()))
			})
			.collect()
	}

	/// "Fetch returns the entire file (no filter, no sort, no paging —
	/// explicit limitation)" (spec §4.3.2).
	pub async fn execute_fetch(&mut self, _op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		let rows = self.rows().to_vec();
		let total_rows = rows.len() as u64;
		Ok(ExecuteOutcome::Fetch { rows, start_row: 0, end_row: total_rows, total_rows })
	}

	pub async fn execute_add(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		let row: Record = self.descriptor.fields.iter().map(|f| (f.name.clone(), op.values.get(&f.name).map(Value::from).unwrap_or(Value::Null))).collect();
		self.rows_mut().push(row.clone());
		self.persist().await?;
		Ok(ExecuteOutcome::Row(row))
	}

	/// "Add/Update/Remove linearly scan for a row whose PK projection
	/// deep-equals the request PK and rewrite the whole file on change"
	/// (spec §4.3.2).
	pub async fn execute_update(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		let pk = self.extract_pk(op)?;
		let position = self.rows().iter().position(|row| self.pk_matches(row, &pk)).ok_or(DataSourceError::RowNotFound)?;

		for field in self.descriptor.non_pk_fields() {
			if let Some(value) = op.values.get(&field.name) {
				self.rows_mut()[position].insert(field.name.clone(), Value::from(value.clone()));
			}
		}
		self.persist().await?;
		Ok(ExecuteOutcome::Row(self.rows()[position].clone()))
	}

	pub async fn execute_remove(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		let pk = self.extract_pk(op)?;
		let position = self.rows().iter().position(|row| self.pk_matches(row, &pk)).ok_or(DataSourceError::RowNotFound)?;
		let removed = self.rows_mut().remove(position);
		self.persist().await?;
		Ok(ExecuteOutcome::Row(removed))
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::datasource::descriptor::{FieldDescriptor, FieldType, ServerType};

	fn descriptor() -> DataSourceDescriptor
	{
		DataSourceDescriptor {
			id: "note".into(),
			server_type: ServerType::Json,
			fields: vec![
				FieldDescriptor { name: "id".into(), native_name: None, field_type: FieldType::Integer, primary_key: true },
				FieldDescriptor { name: "text".into(), native_name: None, field_type: FieldType::Text, primary_key: false },
			],
			table_name: None,
			db_name: None,
			file_name: Some("note.json".into()),
			json_prefix: None,
			json_suffix: None,
		}
	}

	fn fetch_op() -> DsOperationSpec
	{
		DsOperationSpec {
			app_id: None,
			data_source_name: "note".into(),
			operation_type: dsbroker_wire::OperationType::Fetch,
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
	async fn missing_file_is_an_empty_list()
	{
		let dir = tempfile::tempdir().unwrap();
		let mut ds = JsonFileDataSource::new(descriptor(), dir.path());
		ds.init().await.unwrap();
		let outcome = ds.execute_fetch(&fetch_op()).await.unwrap();
		let ExecuteOutcome::Fetch { rows, total_rows, .. } = outcome else { panic!("expected Fetch") };
		assert_eq!(rows.len(), 0);
		assert_eq!(total_rows, 0);
	}

	#[tokio::test]
	async fn add_then_update_then_remove_round_trips_through_the_file()
	{
		let dir = tempfile::tempdir().unwrap();
		let mut ds = JsonFileDataSource::new(descriptor(), dir.path());
		ds.init().await.unwrap();

		let mut add_op = fetch_op();
		add_op.values.insert("id".into(), serde_json::json!(1));
		add_op.values.insert("text".into(), serde_json::json!("hello"));
		ds.execute_add(&add_op).await.unwrap();

		let mut update_op = fetch_op();
		update_op.simple_criteria = Some(serde_json::Map::from_iter([("id".to_owned(), serde_json::json!(1))]));
		update_op.values.insert("text".into(), serde_json::json!("updated"));
		let outcome = ds.execute_update(&update_op).await.unwrap();
		let ExecuteOutcome::Row(row) = outcome else { panic!("expected Row") };
		assert_eq!(row.get("text"), Some(&Value::Text("updated".into())));

		let mut remove_op = fetch_op();
		remove_op.simple_criteria = Some(serde_json::Map::from_iter([("id".to_owned(), serde_json::json!(1))]));
		ds.execute_remove(&remove_op).await.unwrap();

		let outcome = ds.execute_fetch(&fetch_op()).await.unwrap();
		let ExecuteOutcome::Fetch { total_rows, .. } = outcome else { panic!("expected Fetch") };
		assert_eq!(total_rows, 0);
	}
}
