use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// The scalar domain a [`Record`][crate] and an [`AdvancedCriteria`][crate::Criterion]
/// field value live in.
///
/// This is deliberately narrower than `serde_json::Value`: a [`Record`]
/// field can never be a nested object, and distinguishing [`Value::List`]
/// lets the criteria compiler implement `inSet` / simple array-valued
/// criteria (spec: "for arrays, OR over each element") without re-inspecting
/// raw JSON at compile time.
///
/// [`Record`]: crate
#[derive(Debug, Clone, PartialEq)]
pub enum Value
{
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Bytes(Vec<u8>),
	/// An ISO-8601 timestamp, kept as text on the wire; `DataSource`
	/// implementations parse it against the field's declared type.
	DateTime(String),
	List(Vec<Value>),
}

impl Value
{
	pub fn is_null(&self) -> bool
	{
		matches!(self, Self::Null)
	}

	pub fn as_text(&self) -> Option<&str>
	{
		match self {
			Self::Text(s) | Self::DateTime(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]>
	{
		match self {
			Self::List(items) => Some(items),
			_ => None,
		}
	}
}

impl From<&serde_json::Value> for Value
{
	fn from(raw: &serde_json::Value) -> Self
	{
		Value::from(raw.clone())
	}
}

impl From<serde_json::Value> for Value
{
	/// Converts a raw JSON value into our narrower scalar domain.
	///
	/// Objects have no representation here; they collapse to [`Value::Null`]
	/// rather than producing an error, because this conversion is used in
	/// contexts (criteria literals, record field values) where an object
	/// never legitimately appears and the caller has already validated the
	/// envelope shape.
	fn from(raw: serde_json::Value) -> Self
	{
		match raw {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => n
				.as_i64()
				.map(Value::Int)
				.or_else(|| n.as_f64().map(Value::Float))
				.unwrap_or(Value::Null),
			serde_json::Value::String(s) => Value::Text(s),
			serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
			serde_json::Value::Object(_) => Value::Null,
		}
	}
}

impl From<Value> for serde_json::Value
{
	fn from(value: Value) -> Self
	{
		match value {
			Value::Null => serde_json::Value::Null,
			Value::Bool(b) => serde_json::Value::Bool(b),
			Value::Int(i) => serde_json::Value::Number(i.into()),
			Value::Float(f) => serde_json::Number::from_f64(f)
				.map(serde_json::Value::Number)
				.unwrap_or(serde_json::Value::Null),
			Value::Text(s) | Value::DateTime(s) => serde_json::Value::String(s),
			Value::Bytes(bytes) => {
				serde_json::Value::Array(bytes.into_iter().map(|b| serde_json::Value::Number(b.into())).collect())
			},
			Value::List(items) => serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect()),
		}
	}
}

impl Serialize for Value
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serde_json::Value::from(self.clone()).serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Value
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		serde_json::Value::deserialize(deserializer).map(Value::from)
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn round_trips_scalars()
	{
		for raw in [
			serde_json::json!(null),
			serde_json::json!(true),
			serde_json::json!(42),
			serde_json::json!(1.5),
			serde_json::json!("hello"),
			serde_json::json!([1, 2, 3]),
		] {
			let value = Value::from(raw.clone());
			assert_eq!(serde_json::Value::from(value), raw);
		}
	}

	#[test]
	fn objects_collapse_to_null()
	{
		let value = Value::from(serde_json::json!({ "a": 1 }));
		assert_eq!(value, Value::Null);
	}
}
