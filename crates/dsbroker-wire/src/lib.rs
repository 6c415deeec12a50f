//! Wire-level types shared between the envelope parser, the criteria
//! compiler, the operation lifecycle, and the response formatter.
//!
//! Nothing in this crate talks to a database or to HTTP; it only describes
//! the shapes that cross the wire.

mod value;
pub use value::Value;

mod criterion;
pub use criterion::{Criterion, FieldOperator, LogicalOperator};

mod envelope;
pub use envelope::{OperationKind, RawOperation, Transaction};

mod response;
pub use response::{DsResponseExtra, Response, ResponseKind, RpcResponseExtra, Status};

/// Sentinel for a `null` value that cannot be represented as literal JSON
/// `null` in a form field.
pub const SENTINEL_NULL: &str = "__ISC_NULL__";

/// Sentinel for an empty string that cannot be represented as `""` in a form
/// field.
pub const SENTINEL_EMPTY_STRING: &str = "__ISC_EMPTY_STRING__";

/// Decodes the two sentinel strings into their real values.
///
/// Any other string is returned unchanged, wrapped as [`serde_json::Value::String`].
pub fn decode_sentinel(raw: &str) -> serde_json::Value
{
	match raw {
		SENTINEL_NULL => serde_json::Value::Null,
		SENTINEL_EMPTY_STRING => serde_json::Value::String(String::new()),
		other => serde_json::Value::String(other.to_owned()),
	}
}

/// The four operation types a [`DataSource`][crate] can be asked to perform.
///
/// [crate]: https://docs.rs/dsbroker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType
{
	Fetch,
	Add,
	Update,
	Remove,
	Custom,
}

impl std::fmt::Display for OperationType
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		let s = match self {
			Self::Fetch => "fetch",
			Self::Add => "add",
			Self::Update => "update",
			Self::Remove => "remove",
			Self::Custom => "custom",
		};
		f.write_str(s)
	}
}

impl std::str::FromStr for OperationType
{
	type Err = UnknownOperationType;

	fn from_str(s: &str) -> Result<Self, Self::Err>
	{
		match s {
			"fetch" => Ok(Self::Fetch),
			"add" => Ok(Self::Add),
			"update" => Ok(Self::Update),
			"remove" => Ok(Self::Remove),
			"custom" => Ok(Self::Custom),
			_ => Err(UnknownOperationType(s.to_owned())),
		}
	}
}

/// Error returned when an `"<dsName>_<opType>"` string or an
/// `operationConfig.operationType` names an unrecognised operation type.
#[derive(Debug, thiserror::Error)]
#[error("unknown operation type `{0}`")]
pub struct UnknownOperationType(pub String);

/// `textMatchStyle` as specified in the glossary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextMatchStyle
{
	Exact,
	ExactCase,
	#[default]
	Substring,
	StartsWith,
}
