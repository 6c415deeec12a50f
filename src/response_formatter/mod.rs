//! Serialises a response batch into the shape the requesting transport
//! expects (spec §4.7, §6). Nothing here talks to a back end; it only turns
//! `&[Response]` into a body string plus a content type.

use std::collections::HashMap;

use dsbroker_wire::Response;

/// `dataFormat` as requested by the client (spec §4.7): picked once per
/// request, not per operation, since SmartClient clients always request the
/// same format for every operation in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat
{
	Json,
	Xml,
	Custom,
}

impl DataFormat
{
	/// Reads the configured `dynamicDataFormatParamName` query param
	/// (default `isc_dataFormat`), defaulting to JSON.
	pub fn from_query(query: &HashMap<String, String>, param_name: &str) -> Self
	{
		match query.get(param_name).map(String::as_str) {
			Some("xml") => Self::Xml,
			Some("custom") => Self::Custom,
			_ => Self::Json,
		}
	}
}

/// Which transport the client is using (spec §6 `isc_xhr`/`xmlHttp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport
{
	Xhr,
	HiddenFrame,
}

impl Transport
{
	pub fn from_query(query: &HashMap<String, String>) -> Self
	{
		let is_xhr = query.get("isc_xhr").is_some_and(|v| v == "1") || query.get("xmlHttp").is_some_and(|v| v == "true");
		if is_xhr { Self::Xhr } else { Self::HiddenFrame }
	}
}

/// How `jscallback` selects the hidden-iframe dispatch form (spec §6:
/// `iframeNewWindow`, `iframe` recurse-up, or a literal expression).
fn callback_dispatch(jscallback: Option<&str>) -> String
{
	match jscallback {
		Some("iframeNewWindow") => "window.opener.isc.Comm.hiddenFrameReply(transactionNum, results);".to_owned(),
		Some("iframe") => "parent.parent.isc.Comm.hiddenFrameReply(transactionNum, results);".to_owned(),
		Some(literal) => format!("{literal};"),
		None => "parent.isc.Comm.hiddenFrameReply(transactionNum, results);".to_owned(),
	}
}

/// Everything the formatter needs about the request that isn't in the
/// response batch itself.
pub struct FormatRequest<'a>
{
	pub data_format: DataFormat,
	pub transport: Transport,
	pub is_rest: bool,
	/// `rest.wrapJSONResponses` (spec §6) — only meaningful when `is_rest`.
	pub wrap_json_responses: bool,
	pub transaction_num: Option<i64>,
	pub jscallback: Option<&'a str>,
	pub security_prefix: &'a str,
	pub security_suffix: &'a str,
}

/// A formatted response body and the content type it must be served with.
pub struct FormattedBody
{
	pub content_type: &'static str,
	pub body: String,
}

/// Builds the serialised body for a successful transaction (spec §4.7).
pub fn format(responses: &[Response], request: &FormatRequest<'_>) -> FormattedBody
{
	let (mut content_type, mut body) = match request.data_format {
		DataFormat::Json => ("application/json", serialize_json(responses, request.is_rest && request.wrap_json_responses)),
		DataFormat::Xml => ("text/xml", serialize_xml(responses)),
		DataFormat::Custom => ("text/plain", serialize_custom(responses)),
	};

	if !request.security_prefix.is_empty() || !request.security_suffix.is_empty() {
		body = format!("{}{}{}", request.security_prefix, body, request.security_suffix);
		content_type = "text/plain";
	}

	if !request.is_rest {
		body = frame_ida_body(&body);
		if request.transport == Transport::HiddenFrame {
			body = hidden_frame_trampoline(request.transaction_num, request.jscallback, &body);
			content_type = "text/html";
		}
	}

	FormattedBody { content_type, body }
}

/// The IDA transport framing markers (spec §6).
fn frame_ida_body(body: &str) -> String
{
	format!("//isc_RPCResponseStart-->{body}//isc_RPCResponseEnd")
}

/// The hidden-iframe HTML trampoline (spec §4.7: "explicitly called out …
/// as prescriptive, not algorithmic" — a template filler, not a derived
/// algorithm).
fn hidden_frame_trampoline(transaction_num: Option<i64>, jscallback: Option<&str>, framed_results: &str) -> String
{
	let transaction_num = transaction_num.map(|n| n.to_string()).unwrap_or_default();
	let dispatch = callback_dispatch(jscallback);
	let escaped_results = framed_results.replace('\\', "\\\\").replace('\n', "\\n").replace('"', "\\\"");
	format!(
		"<html><head><script>\n\
		 document.domain = document.domain;\n\
		 var transactionNum = {transaction_num};\n\
		 var results = \"{escaped_results}\";\n\
		 {dispatch}\n\
		 </script></head><body></body></html>"
	)
}

/// The resubmit trampoline for an empty `_transaction` on an IDA call (spec
/// §4.6, §7): the client must retry, possibly via a different handler
/// depending on the XHR flag and `isc_resubmit` marker.
pub fn resubmit_trampoline(query: &HashMap<String, String>) -> String
{
	let call = if query.get("isc_resubmit").is_some_and(|v| v == "maxPostSizeExceeded") {
		"parent.isc.RPCManager.handleMaxPostSizeExceeded(window.name);"
	} else if query.get("isc_resubmit").is_some_and(|v| v == "requestAborted") {
		"parent.isc.RPCManager.handleRequestAborted(window.name);"
	} else {
		"parent.isc.RPCManager.retryOperation(window.name);"
	};
	format!("<html><head><script>{call}</script></head><body></body></html>")
}

fn serialize_json(responses: &[Response], wrap: bool) -> String
{
	if !wrap {
		return serde_json::to_string(responses).unwrap_or_default();
	}

	if responses.len() == 1 {
		serde_json::json!({ "response": &responses[0] }).to_string()
	} else {
		let wrapped: Vec<_> = responses.iter().map(|r| serde_json::json!({ "response": r })).collect();
		serde_json::json!({ "responses": wrapped }).to_string()
	}
}

fn serialize_xml(responses: &[Response]) -> String
{
	let bodies: String = responses
		.iter()
		.map(|r| quick_xml::se::to_string_with_root("response", r).unwrap_or_default())
		.collect();

	if responses.len() == 1 { bodies } else { format!("<responses>{bodies}</responses>") }
}

/// "the responses are serialised via their own `toString`" (spec §4.7) — the
/// original's duck-typed `toString()` dispatch has no Rust equivalent, so
/// this mode falls back to each response's `Debug` form.
fn serialize_custom(responses: &[Response]) -> String
{
	responses.iter().map(|r| format!("{r:?}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests
{
	use dsbroker_wire::DsResponseExtra;

	use super::*;

	fn sample_response() -> Response
	{
		Response::ds_success(serde_json::json!({"id": 1}), DsResponseExtra::default())
	}

	#[test]
	fn rest_single_response_is_wrapped_in_response_key()
	{
		let responses = vec![sample_response()];
		let request = FormatRequest {
			data_format: DataFormat::Json,
			transport: Transport::Xhr,
			is_rest: true,
			wrap_json_responses: true,
			transaction_num: None,
			jscallback: None,
			security_prefix: "",
			security_suffix: "",
		};
		let formatted = format(&responses, &request);
		assert!(formatted.body.starts_with("{\"response\":"));
	}

	#[test]
	fn rest_multiple_responses_are_wrapped_in_responses_key()
	{
		let responses = vec![sample_response(), sample_response()];
		let request = FormatRequest {
			data_format: DataFormat::Json,
			transport: Transport::Xhr,
			is_rest: true,
			wrap_json_responses: true,
			transaction_num: None,
			jscallback: None,
			security_prefix: "",
			security_suffix: "",
		};
		let formatted = format(&responses, &request);
		assert!(formatted.body.starts_with("{\"responses\":["));
	}

	#[test]
	fn ida_xhr_body_is_framed_with_transport_markers()
	{
		let responses = vec![sample_response()];
		let request = FormatRequest {
			data_format: DataFormat::Json,
			transport: Transport::Xhr,
			is_rest: false,
			wrap_json_responses: false,
			transaction_num: Some(1),
			jscallback: None,
			security_prefix: "",
			security_suffix: "",
		};
		let formatted = format(&responses, &request);
		assert!(formatted.body.starts_with("//isc_RPCResponseStart-->"));
		assert!(formatted.body.ends_with("//isc_RPCResponseEnd"));
	}

	#[test]
	fn ida_hidden_frame_body_is_an_html_trampoline()
	{
		let responses = vec![sample_response()];
		let request = FormatRequest {
			data_format: DataFormat::Json,
			transport: Transport::HiddenFrame,
			is_rest: false,
			wrap_json_responses: false,
			transaction_num: Some(1),
			jscallback: None,
			security_prefix: "",
			security_suffix: "",
		};
		let formatted = format(&responses, &request);
		assert_eq!(formatted.content_type, "text/html");
		assert!(formatted.body.contains("hiddenFrameReply"));
	}

	#[test]
	fn security_wrapping_switches_content_type_to_text_plain()
	{
		let responses = vec![sample_response()];
		let request = FormatRequest {
			data_format: DataFormat::Json,
			transport: Transport::Xhr,
			is_rest: true,
			wrap_json_responses: true,
			transaction_num: None,
			jscallback: None,
			security_prefix: "//'\"]}'",
			security_suffix: "",
		};
		let formatted = format(&responses, &request);
		assert_eq!(formatted.content_type, "text/plain");
		assert!(formatted.body.starts_with("//'\"]}'"));
	}

	#[test]
	fn resubmit_trampoline_defaults_to_retry_operation()
	{
		let body = resubmit_trampoline(&HashMap::new());
		assert!(body.contains("retryOperation"));
	}
}
