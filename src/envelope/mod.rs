//! Parses an incoming HTTP request into a [`dsbroker_wire::Transaction`]
//! (spec §4.6). The IDA and REST front-ends share the JSON/XML document
//! parsing here but differ in how they locate that document and what else
//! they overlay onto it.

mod error;
pub use error::EnvelopeError;

pub mod ida;
pub mod rest;

use dsbroker_wire::Transaction;

/// What the front-end parser produced from one incoming HTTP request.
pub enum ParsedRequest
{
	/// A transaction envelope ready for the coordinator.
	Transaction(Transaction),
	/// The client sent an empty `_transaction` (spec §4.6, §7) — the
	/// response formatter replies with the browser-retry trampoline instead
	/// of running a transaction.
	Resubmit,
}

/// Parses `raw` as a transaction document, trying JSON first and falling
/// back to XML (spec §4.6: "Parses `_transaction` first as JSON; on
/// failure, as XML").
fn parse_transaction_document(raw: &str) -> Result<Transaction, EnvelopeError>
{
	if let Ok(txn) = serde_json::from_str::<Transaction>(raw) {
		return Ok(txn);
	}
	quick_xml::de::from_str::<Transaction>(raw).map_err(|_| EnvelopeError::Unparsable)
}

/// Parses `JSON.parse`-style: a value is decoded as JSON if it looks like
/// one, else kept as a plain string (spec §4.6: "with `JSON.parse` attempted
/// for each value").
fn parse_param_value(raw: &str) -> serde_json::Value
{
	serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()))
}
