//! The three HTTP routes (spec §6): `idaCall`, `restCall`,
//! `dataSourceLoader`. Request correlation and tracing are composed once over
//! the whole router in [`middleware`], following `cs2kz-api`'s
//! `ServiceBuilder` composition in `main.rs` (spec §4, Concurrency §5
//! addition) rather than a per-handler span.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::routing::any;
use axum::Router;
use tower::ServiceBuilder;

use crate::coordinator::TransactionCoordinator;
use crate::envelope::{ida, rest, ParsedRequest};
use crate::response_formatter::{self, DataFormat, FormatRequest, Transport};
use crate::runtime::ServerContext;

mod middleware;

/// Builds the three-route `axum` router, reading each path from
/// `server.router.*` (spec §6).
pub fn router(ctx: ServerContext) -> Router
{
	let router_config = ctx.config.server.router.clone();

	Router::new()
		.route(&router_config.ida_call.path, any(ida_call))
		.route(&router_config.data_source_loader.path, any(data_source_loader))
		.route(&router_config.rest_call.path, any(rest_call))
		.route(&format!("{}/{{*rest}}", router_config.rest_call.path), any(rest_call))
		.layer(ServiceBuilder::new().layer(middleware::request_id_layers()).layer(middleware::trace_layer()))
		.with_state(ctx)
}

async fn ida_call(State(ctx): State<ServerContext>, Query(query): Query<HashMap<String, String>>, body: String) -> AxumResponse
{
	match ida::parse(&query, &body) {
		Ok(ParsedRequest::Resubmit) => html_response(response_formatter::resubmit_trampoline(&query)),
		Ok(ParsedRequest::Transaction(txn)) => run_transaction(&ctx, txn, &query, false).await,
		Err(error) => top_level_error_response(&error),
	}
}

async fn rest_call(
	State(ctx): State<ServerContext>,
	method: Method,
	uri: Uri,
	Query(query): Query<HashMap<String, String>>,
	body: String,
) -> AxumResponse
{
	let base_path = ctx.config.server.router.rest_call.path.clone();
	let overlay = rest::parse_url_overlay(uri.path(), &base_path);

	let pk_field_name = match (&overlay.data_source_name, &overlay.raw_pk) {
		(Some(data_source_name), Some(_)) => match ctx.data_source_pool.descriptor_for(data_source_name).await {
			Ok(descriptor) => descriptor.pk_fields().next().map(|field| field.name.clone()),
			Err(error) => {
				tracing::warn!(%error, data_source_name, "could not resolve primary key field for REST _rawPk overlay");
				None
			},
		},
		_ => None,
	};

	match rest::parse(&method, uri.path(), &base_path, &query, &body, pk_field_name.as_deref()) {
		Ok(ParsedRequest::Resubmit) => (StatusCode::BAD_REQUEST, "empty transaction").into_response(),
		Ok(ParsedRequest::Transaction(txn)) => run_transaction(&ctx, txn, &query, true).await,
		Err(error) => top_level_error_response(&error),
	}
}

/// `GET ?dataSource=a,b,c` (spec §6): returns `isc.DataSource.create({...});`
/// per requested id, skipping `$systemSchema` and de-duplicating.
async fn data_source_loader(State(ctx): State<ServerContext>, Query(query): Query<HashMap<String, String>>) -> AxumResponse
{
	let requested = query.get("dataSource").map(String::as_str).unwrap_or_default();
	let mut seen = std::collections::HashSet::new();
	let mut body = String::new();

	for id in requested.split(',').map(str::trim).filter(|id| !id.is_empty() && *id != "$systemSchema") {
		if !seen.insert(id) {
			continue;
		}
		match ctx.data_source_pool.descriptor_for(id).await {
			Ok(descriptor) => body.push_str(&descriptor_to_js(&descriptor)),
			Err(error) => tracing::warn!(%error, data_source_name = id, "failed to load descriptor for DataSourceLoader"),
		}
	}

	let mut response = body.into_response();
	response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/javascript"));
	response
}

fn descriptor_to_js(descriptor: &crate::datasource::DataSourceDescriptor) -> String
{
	use crate::datasource::FieldType;

	let field_type_js = |field_type: FieldType| -> &'static str {
		match field_type {
			FieldType::Text => "text",
			FieldType::Integer | FieldType::Sequence => "integer",
			FieldType::Float => "float",
			FieldType::Boolean => "boolean",
			FieldType::Date => "date",
			FieldType::DateTime => "datetime",
			FieldType::Binary => "binary",
		}
	};

	let fields: Vec<_> = descriptor
		.fields
		.iter()
		.map(|field| serde_json::json!({ "name": field.name, "type": field_type_js(field.field_type), "primaryKey": field.primary_key }))
		.collect();
	let config = serde_json::json!({ "ID": descriptor.id, "fields": fields });
	format!("isc.DataSource.create({config});\n")
}

/// Runs one transaction end to end and formats its responses (spec §4.5,
/// §4.7).
async fn run_transaction(ctx: &ServerContext, txn: dsbroker_wire::Transaction, query: &HashMap<String, String>, is_rest: bool) -> AxumResponse
{
	let transaction_num = txn.transaction_num;
	let jscallback = txn.jscallback.clone();
	let mut coordinator = TransactionCoordinator::new(txn);
	let strict_sql_filtering = ctx.config.data_source.strict_sql_filtering;

	match coordinator.execute(&ctx.data_source_pool, &ctx.rpc_objects, strict_sql_filtering).await {
		Ok(responses) => {
			let format_request = FormatRequest {
				data_format: DataFormat::from_query(query, &ctx.config.rest.dynamic_data_format_param_name),
				transport: Transport::from_query(query),
				is_rest,
				wrap_json_responses: ctx.config.rest.wrap_json_responses,
				transaction_num,
				jscallback: jscallback.as_deref(),
				security_prefix: &ctx.config.rest.json_prefix,
				security_suffix: &ctx.config.rest.json_suffix,
			};
			let formatted = response_formatter::format(&responses, &format_request);
			framed_response(StatusCode::OK, formatted.content_type, formatted.body)
		},
		// "errors above the operation boundary … become a single top-level
		// error that short-circuits the batch" (spec §7).
		Err(error) => {
			tracing::error!(%error, "transaction init failed; aborting batch");
			framed_response(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", error.to_string())
		},
	}
}

fn top_level_error_response(error: &crate::envelope::EnvelopeError) -> AxumResponse
{
	tracing::warn!(%error, "envelope parse failed");
	framed_response(StatusCode::BAD_REQUEST, "text/plain", error.to_string())
}

fn html_response(body: String) -> AxumResponse
{
	framed_response(StatusCode::OK, "text/html", body)
}

/// All response bodies are served with caching disabled (spec §4.7: "All
/// bodies set `Cache-Control: no-cache`, `Pragma: no-cache`, and a past
/// `Expires` date").
fn framed_response(status: StatusCode, content_type: &'static str, body: String) -> AxumResponse
{
	let mut response = (status, body).into_response();
	let headers = response.headers_mut();
	headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
	headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
	headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
	headers.insert(header::EXPIRES, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"));
	response
}
