//! REST front-end parsing (spec §4.6): the `/ds/<dsName>[/<opType>][/<pk>]`
//! URL convention layered on top of the same transaction-document parsing
//! the IDA front-end uses.

use std::collections::HashMap;

use dsbroker_wire::{DsOperationSpec, OperationKind, OperationType, RawOperation, Transaction};
use http::Method;

use super::ida::extract_transaction_field;
use super::{parse_param_value, parse_transaction_document, EnvelopeError, ParsedRequest};

/// The URL overlay extracted from a REST path of the form
/// `/<basePath>/<dsName>[/<opType>][/<pk>]` (spec §4.6).
#[derive(Debug, Default, Clone)]
pub struct UrlOverlay
{
	pub data_source_name: Option<String>,
	pub operation_type: Option<OperationType>,
	pub raw_pk: Option<String>,
}

/// Splits the REST path into an overlay, per the corrected algorithm from
/// `spec.md` §9 Open Questions: `pathParts = split(stripQuery(path), "/")
/// .filter(nonEmpty)`, not the original's double-split.
pub fn parse_url_overlay(path: &str, base_path: &str) -> UrlOverlay
{
	let path = path.split('?').next().unwrap_or(path);
	let rest = path.strip_prefix(base_path).unwrap_or(path);
	let mut parts = rest.split('/').filter(|s| !s.is_empty());

	UrlOverlay {
		data_source_name: parts.next().map(str::to_owned),
		operation_type: parts.next().and_then(|s| s.parse().ok()),
		raw_pk: parts.next().map(str::to_owned),
	}
}

/// The operation type implied by the HTTP method when the URL doesn't name
/// one explicitly (spec §4.6: "GET→fetch, POST→add, PUT/PATCH→update,
/// DELETE→remove").
pub fn operation_type_for_method(method: &Method) -> OperationType
{
	match *method {
		Method::POST => OperationType::Add,
		Method::PUT | Method::PATCH => OperationType::Update,
		Method::DELETE => OperationType::Remove,
		_ => OperationType::Fetch,
	}
}

/// Parses one REST request into a transaction (spec §4.6).
///
/// `pk_field_name` names the target DataSource's primary-key field, already
/// resolved by the caller from its descriptor — a URL's trailing `_rawPk`
/// segment is meaningless without knowing which field it binds to.
pub fn parse(
	method: &Method,
	path: &str,
	base_path: &str,
	query: &HashMap<String, String>,
	body: &str,
	pk_field_name: Option<&str>,
) -> Result<ParsedRequest, EnvelopeError>
{
	let mut txn = match extract_transaction_field(query, body) {
		Some(raw) if !raw.is_empty() => parse_transaction_document(&raw)?,
		Some(_) => return Ok(ParsedRequest::Resubmit),
		// "If `_transaction` is absent but the body is a parsed JSON/XML
		// document, treat that document as the transaction" (spec §4.6).
		None if !body.is_empty() => parse_transaction_document(body)?,
		None => Transaction::default(),
	};

	let overlay = parse_url_overlay(path, base_path);
	let default_operation_type = operation_type_for_method(method);

	// A bare URL call (no `_transaction`, no body) carries its whole operation
	// in the path alone — spec §6's "`/<basePath>/<dsName>[/<opType>][/<pk>]`"
	// form is first-class, not just an overlay onto an existing body.
	if txn.operations.is_empty() {
		if let Some(data_source_name) = &overlay.data_source_name {
			txn.operations.push(RawOperation { kind: OperationKind::DataSource(default_ds_operation(data_source_name.clone())) });
		}
	}

	for raw_op in &mut txn.operations {
		if let OperationKind::DataSource(spec) = &mut raw_op.kind {
			apply_overlay(spec, &overlay, default_operation_type, pk_field_name);
		}
	}
	merge_params(&mut txn, query, body);

	Ok(ParsedRequest::Transaction(txn))
}

/// A `DsOperationSpec` with no criteria/values of its own, for the bare-URL
/// REST form — `apply_overlay` then fills in `operationType` and the
/// `_rawPk` criterion.
fn default_ds_operation(data_source_name: String) -> DsOperationSpec
{
	DsOperationSpec {
		app_id: None,
		data_source_name,
		operation_type: OperationType::Fetch,
		text_match_style: None,
		data: serde_json::Value::Object(serde_json::Map::new()),
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

fn apply_overlay(spec: &mut DsOperationSpec, overlay: &UrlOverlay, default_operation_type: OperationType, pk_field_name: Option<&str>)
{
	if let Some(name) = &overlay.data_source_name {
		spec.data_source_name = name.clone();
	}
	spec.operation_type = overlay.operation_type.unwrap_or(default_operation_type);

	if let (Some(raw_pk), Some(field)) = (&overlay.raw_pk, pk_field_name) {
		spec.simple_criteria
			.get_or_insert_with(serde_json::Map::new)
			.insert(field.to_owned(), serde_json::Value::String(raw_pk.clone()));
	}
}

/// Merges query and body params into each operation's `data`, skipping meta
/// keys; params named with the meta-data prefix are applied to the
/// operation's own fields instead (spec §4.6). `DsOperationSpec` is a fixed
/// struct rather than a dynamic property bag, so only the meta keys it has a
/// field for (`componentId`, `startRow`, `endRow`) are recognised — anything
/// else under the prefix is logged and dropped.
fn merge_params(txn: &mut Transaction, query: &HashMap<String, String>, body: &str)
{
	const META_KEYS: &[&str] = &["isc_dataFormat", "isc_metaDataPrefix"];
	let meta_prefix = query.get("isc_metaDataPrefix").map(String::as_str).unwrap_or("_");

	let params: Vec<(String, String)> = query
		.iter()
		.map(|(k, v)| (k.clone(), v.clone()))
		.chain(url::form_urlencoded::parse(body.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())))
		.filter(|(k, _)| !META_KEYS.contains(&k.as_str()))
		.collect();

	for raw_op in &mut txn.operations {
		let OperationKind::DataSource(spec) = &mut raw_op.kind else { continue };
		if !spec.data.is_object() {
			spec.data = serde_json::Value::Object(serde_json::Map::new());
		}
		let data = spec.data.as_object_mut().expect("just ensured object");

		for (key, value) in &params {
			match key.strip_prefix(meta_prefix) {
				Some("componentId") => spec.component_id = Some(value.clone()),
				Some("startRow") => spec.start_row = value.parse().ok(),
				Some("endRow") => spec.end_row = value.parse().ok(),
				Some(unknown) => tracing::trace!(key = unknown, "unrecognised meta-data-prefixed param, dropping"),
				None => {
					data.insert(key.clone(), parse_param_value(value));
				},
			}
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn parse_url_overlay_splits_datasource_optype_and_pk()
	{
		let overlay = parse_url_overlay("/isomorphic/RESTCall/widget/update/42", "/isomorphic/RESTCall");
		assert_eq!(overlay.data_source_name.as_deref(), Some("widget"));
		assert_eq!(overlay.operation_type, Some(OperationType::Update));
		assert_eq!(overlay.raw_pk.as_deref(), Some("42"));
	}

	#[test]
	fn operation_type_for_method_matches_rest_conventions()
	{
		assert_eq!(operation_type_for_method(&Method::GET), OperationType::Fetch);
		assert_eq!(operation_type_for_method(&Method::POST), OperationType::Add);
		assert_eq!(operation_type_for_method(&Method::PUT), OperationType::Update);
		assert_eq!(operation_type_for_method(&Method::DELETE), OperationType::Remove);
	}

	#[test]
	fn missing_transaction_wraps_whole_body_as_one_operation_document()
	{
		let query = HashMap::new();
		let body = r#"{"operations":[{"appID":"builtinApp","operation":"widget_fetch"}]}"#;
		let ParsedRequest::Transaction(txn) = parse(&Method::GET, "/isomorphic/RESTCall/widget", "/isomorphic/RESTCall", &query, body, None).unwrap()
		else {
			panic!("expected transaction")
		};
		assert_eq!(txn.operations.len(), 1);
	}

	#[test]
	fn bare_url_call_with_no_body_synthesizes_one_operation_from_the_overlay()
	{
		let query = HashMap::new();
		let ParsedRequest::Transaction(txn) =
			parse(&Method::GET, "/isomorphic/RESTCall/widget/42", "/isomorphic/RESTCall", &query, "", Some("id")).unwrap()
		else {
			panic!("expected transaction")
		};
		assert_eq!(txn.operations.len(), 1);
		let OperationKind::DataSource(spec) = &txn.operations[0].kind else { panic!("expected ds op") };
		assert_eq!(spec.data_source_name, "widget");
		assert_eq!(spec.operation_type, OperationType::Fetch);
		assert_eq!(spec.simple_criteria.as_ref().unwrap().get("id").unwrap(), "42");
	}

	#[test]
	fn raw_pk_overlay_requires_a_resolved_pk_field_name()
	{
		let query = HashMap::new();
		let body = r#"{"operations":[{"appID":"builtinApp","operation":"widget_fetch"}]}"#;
		let ParsedRequest::Transaction(txn) =
			parse(&Method::GET, "/isomorphic/RESTCall/widget/fetch/7", "/isomorphic/RESTCall", &query, body, Some("id")).unwrap()
		else {
			panic!("expected transaction")
		};
		let OperationKind::DataSource(spec) = &txn.operations[0].kind else { panic!("expected ds op") };
		assert_eq!(spec.simple_criteria.as_ref().unwrap().get("id").unwrap(), "7");
	}
}
