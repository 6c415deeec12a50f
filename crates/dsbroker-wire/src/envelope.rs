use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde_json::{Map, Value as Json};

use crate::{decode_sentinel, Criterion, OperationType, TextMatchStyle, SENTINEL_EMPTY_STRING, SENTINEL_NULL};

/// One element of a [`Transaction`]'s `operations` list, after the
/// discrimination described in spec §4.6.
#[derive(Debug, Clone)]
pub enum OperationKind
{
	DataSource(DsOperationSpec),
	Rpc(RpcOperationSpec),
}

/// A parsed DS operation (spec §3 `OperationEnvelope`, DS branch).
#[derive(Debug, Clone)]
pub struct DsOperationSpec
{
	pub app_id: Option<String>,
	pub data_source_name: String,
	pub operation_type: OperationType,
	pub text_match_style: Option<TextMatchStyle>,
	pub data: Json,
	/// `Some` when the envelope carried an `AdvancedCriteria` tree.
	pub advanced_criteria: Option<Criterion>,
	/// `Some` when `criteria` was a plain field->value map (spec §4.3.1
	/// "Otherwise treat each top-level key as a simple field predicate").
	pub simple_criteria: Option<Map<String, Json>>,
	pub values: Map<String, Json>,
	pub old_values: Map<String, Json>,
	pub sort_by: Vec<String>,
	pub start_row: Option<u64>,
	pub end_row: Option<u64>,
	pub component_id: Option<String>,
}

/// A parsed RPC operation (spec §3 `OperationEnvelope`, RPC branch).
#[derive(Debug, Clone)]
pub struct RpcOperationSpec
{
	pub class_name: Option<String>,
	pub method_name: Option<String>,
	pub data: Json,
}

/// One raw element of `operations[]`, still undecided between DS and RPC.
#[derive(Debug, Clone)]
pub struct RawOperation
{
	pub kind: OperationKind,
}

/// A parsed transaction envelope (spec §3, §6).
#[derive(Debug, Clone, Default)]
pub struct Transaction
{
	pub transaction_num: Option<i64>,
	pub jscallback: Option<String>,
	pub operations: Vec<RawOperation>,
}

impl<'de> Deserialize<'de> for Transaction
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		struct Raw
		{
			#[serde(default)]
			#[serde(rename = "transactionNum")]
			transaction_num: Option<i64>,
			#[serde(default)]
			jscallback: Option<String>,
			#[serde(default)]
			operations: Vec<Json>,
		}

		let raw = Raw::deserialize(deserializer)?;
		let operations = raw
			.operations
			.into_iter()
			.map(parse_raw_operation)
			.collect::<Result<Vec<_>, _>>()
			.map_err(DeError::custom)?;

		Ok(Transaction { transaction_num: raw.transaction_num, jscallback: raw.jscallback, operations })
	}
}

/// Classifies one element of `operations[]` per spec §4.6: a sentinel
/// string, a DS-shaped object (`appID` + `operation` or `operationConfig`),
/// or anything else (an RPC operation).
fn parse_raw_operation(raw: Json) -> Result<RawOperation, String>
{
	if let Json::String(s) = &raw {
		let data = decode_sentinel(s);
		return Ok(RawOperation {
			kind: OperationKind::Rpc(RpcOperationSpec { class_name: None, method_name: None, data }),
		});
	}

	let Json::Object(mut obj) = raw else {
		// Any non-object, non-sentinel-string shape is still a valid RPC
		// payload (spec: "anything else -> RPC operation").
		return Ok(RawOperation {
			kind: OperationKind::Rpc(RpcOperationSpec { class_name: None, method_name: None, data: raw }),
		});
	};

	let app_id = take_string(&mut obj, "appID");
	let operation = take_string(&mut obj, "operation");
	let operation_config = obj.remove("operationConfig");

	let ds_shape = operation
		.as_deref()
		.map(split_operation_string)
		.or_else(|| operation_config.as_ref().and_then(parse_operation_config));

	if let Some((data_source_name, operation_type)) = ds_shape {
		let data = obj.remove("data").unwrap_or(Json::Null);
		let criteria = obj.remove("criteria");
		let (advanced_criteria, simple_criteria) = match criteria {
			None | Some(Json::Null) => (None, None),
			Some(Json::Object(map)) if is_advanced_criteria(&map) => {
				let parsed = serde_json::from_value::<Criterion>(Json::Object(map)).map_err(|e| e.to_string())?;
				(Some(parsed), None)
			},
			Some(Json::Object(map)) => (None, Some(map)),
			Some(other) => return Err(format!("unsupported `criteria` shape: {other}")),
		};

		let values = take_object(&mut obj, "values");
		let old_values = take_object(&mut obj, "oldValues");
		let sort_by = match obj.remove("sortBy") {
			Some(Json::String(s)) => vec![s],
			Some(Json::Array(items)) => items.into_iter().filter_map(|v| v.as_str().map(str::to_owned)).collect(),
			_ => Vec::new(),
		};
		let start_row = obj.remove("startRow").and_then(|v| v.as_u64());
		let end_row = obj.remove("endRow").and_then(|v| v.as_u64());
		let component_id = take_string(&mut obj, "componentId");
		let text_match_style = obj
			.remove("textMatchStyle")
			.and_then(|v| serde_json::from_value(v).ok());

		return Ok(RawOperation {
			kind: OperationKind::DataSource(DsOperationSpec {
				app_id,
				data_source_name,
				operation_type,
				text_match_style,
				data,
				advanced_criteria,
				simple_criteria,
				values,
				old_values,
				sort_by,
				start_row,
				end_row,
				component_id,
			}),
		});
	}

	let class_name = take_string(&mut obj, "className");
	let method_name = take_string(&mut obj, "methodName");
	let data = obj.remove("data").unwrap_or(Json::Object(obj));

	Ok(RawOperation { kind: OperationKind::Rpc(RpcOperationSpec { class_name, method_name, data }) })
}

fn take_string(obj: &mut Map<String, Json>, key: &str) -> Option<String>
{
	obj.remove(key).and_then(|v| v.as_str().map(str::to_owned))
}

fn take_object(obj: &mut Map<String, Json>, key: &str) -> Map<String, Json>
{
	match obj.remove(key) {
		Some(Json::Object(map)) => map,
		_ => Map::new(),
	}
}

fn is_advanced_criteria(map: &Map<String, Json>) -> bool
{
	map.get("_constructor").and_then(Json::as_str) == Some("AdvancedCriteria")
}

/// Splits `"<dsName>_<opType>"` on the last underscore that yields a known
/// operation type suffix.
fn split_operation_string(operation: &str) -> Option<(String, OperationType)>
{
	for (suffix, op_type) in [
		("_fetch", OperationType::Fetch),
		("_add", OperationType::Add),
		("_update", OperationType::Update),
		("_remove", OperationType::Remove),
		("_custom", OperationType::Custom),
	] {
		if let Some(ds_name) = operation.strip_suffix(suffix) {
			if !ds_name.is_empty() {
				return Some((ds_name.to_owned(), op_type));
			}
		}
	}
	None
}

fn parse_operation_config(config: &Json) -> Option<(String, OperationType)>
{
	let obj = config.as_object()?;
	let data_source = obj.get("dataSource")?.as_str()?.to_owned();
	let operation_type = obj.get("operationType")?.as_str()?.parse().ok()?;
	Some((data_source, operation_type))
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn classifies_sentinel_operations()
	{
		let raw = serde_json::json!({ "operations": [SENTINEL_NULL, SENTINEL_EMPTY_STRING] });
		let txn: Transaction = serde_json::from_value(raw).unwrap();
		assert_eq!(txn.operations.len(), 2);

		let OperationKind::Rpc(ref rpc) = txn.operations[0].kind else { panic!("expected rpc") };
		assert_eq!(rpc.data, Json::Null);

		let OperationKind::Rpc(ref rpc) = txn.operations[1].kind else { panic!("expected rpc") };
		assert_eq!(rpc.data, Json::String(String::new()));
	}

	#[test]
	fn classifies_ds_operation_by_operation_string()
	{
		let raw = serde_json::json!({
			"operations": [{
				"appID": "builtinApp",
				"operation": "country_fetch",
				"criteria": { "continent": "Europe" },
				"startRow": 0,
				"endRow": 2,
			}],
		});
		let txn: Transaction = serde_json::from_value(raw).unwrap();
		let OperationKind::DataSource(ref ds) = txn.operations[0].kind else { panic!("expected ds op") };
		assert_eq!(ds.data_source_name, "country");
		assert_eq!(ds.operation_type, OperationType::Fetch);
		assert_eq!(ds.simple_criteria.as_ref().unwrap().get("continent").unwrap(), "Europe");
	}

	#[test]
	fn classifies_ds_operation_by_operation_config()
	{
		let raw = serde_json::json!({
			"operations": [{
				"operationConfig": { "dataSource": "country", "operationType": "update" },
				"criteria": {},
			}],
		});
		let txn: Transaction = serde_json::from_value(raw).unwrap();
		let OperationKind::DataSource(ref ds) = txn.operations[0].kind else { panic!("expected ds op") };
		assert_eq!(ds.operation_type, OperationType::Update);
	}

	#[test]
	fn anything_else_is_an_rpc_operation()
	{
		let raw = serde_json::json!({
			"operations": [{ "className": "SomeClass", "methodName": "doThing", "data": { "x": 1 } }],
		});
		let txn: Transaction = serde_json::from_value(raw).unwrap();
		let OperationKind::Rpc(ref rpc) = txn.operations[0].kind else { panic!("expected rpc") };
		assert_eq!(rpc.class_name.as_deref(), Some("SomeClass"));
		assert_eq!(rpc.method_name.as_deref(), Some("doThing"));
	}
}
