//! IDA front-end parsing (spec §4.6): the client's native RPC transport,
//! used by the `idaCall` route (spec §6) and by REST requests that still
//! carry a `_transaction` field.

use std::collections::HashMap;

use super::{parse_transaction_document, EnvelopeError, ParsedRequest};

/// `true` when the request is marked as an IDA/RPC call (spec §6:
/// `isc_rpc=1` or `is_isc_rpc=true`).
pub fn is_ida_request(query: &HashMap<String, String>) -> bool
{
	query.get("isc_rpc").is_some_and(|v| v == "1") || query.get("is_isc_rpc").is_some_and(|v| v == "true")
}

/// Extracts `_transaction` from the body's form fields first, then the
/// query string — the client posts it as a form field, but a resubmit probe
/// (or a plain GET) carries it on the query string instead.
pub(crate) fn extract_transaction_field(query: &HashMap<String, String>, body: &str) -> Option<String>
{
	url::form_urlencoded::parse(body.as_bytes())
		.find(|(k, _)| k == "_transaction")
		.map(|(_, v)| v.into_owned())
		.or_else(|| query.get("_transaction").cloned())
}

/// Extracts and parses `_transaction` (spec §4.6). An empty value is a
/// resubmit signal, not a parse failure.
pub fn parse(query: &HashMap<String, String>, body: &str) -> Result<ParsedRequest, EnvelopeError>
{
	let raw_transaction = extract_transaction_field(query, body);
	let Some(raw_transaction) = raw_transaction.filter(|s| !s.is_empty()) else {
		return Ok(ParsedRequest::Resubmit);
	};

	let mut txn = parse_transaction_document(&raw_transaction)?;
	// "reads `transactionNum` … (overrides any query param)" (spec §4.6) —
	// read the other way round here: the query param only fills in when the
	// parsed document didn't carry one itself.
	if txn.transaction_num.is_none() {
		txn.transaction_num = query.get("isc_tnum").and_then(|v| v.parse().ok());
	}

	Ok(ParsedRequest::Transaction(txn))
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn empty_transaction_is_a_resubmit_signal()
	{
		let query = HashMap::from([("_transaction".to_owned(), String::new())]);
		let result = parse(&query, "").unwrap();
		assert!(matches!(result, ParsedRequest::Resubmit));
	}

	#[test]
	fn transaction_num_falls_back_to_the_query_param()
	{
		let query = HashMap::from([("isc_tnum".to_owned(), "7".to_owned())]);
		let body = "_transaction=%7B%22operations%22%3A%5B%5D%7D";
		let ParsedRequest::Transaction(txn) = parse(&query, body).unwrap() else { panic!("expected transaction") };
		assert_eq!(txn.transaction_num, Some(7));
	}

	#[test]
	fn is_ida_request_recognises_both_query_spellings()
	{
		assert!(is_ida_request(&HashMap::from([("isc_rpc".to_owned(), "1".to_owned())])));
		assert!(is_ida_request(&HashMap::from([("is_isc_rpc".to_owned(), "true".to_owned())])));
		assert!(!is_ida_request(&HashMap::new()));
	}
}
