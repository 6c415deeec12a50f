use std::fmt;
use std::str::FromStr;

use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::Serialize;

use crate::Value;

/// The operator of a logical [`Criterion`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator
{
	And,
	Or,
	Not,
}

impl fmt::Display for LogicalOperator
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.write_str(match self {
			Self::And => "and",
			Self::Or => "or",
			Self::Not => "not",
		})
	}
}

impl FromStr for LogicalOperator
{
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err>
	{
		match s {
			"and" => Ok(Self::And),
			"or" => Ok(Self::Or),
			"not" => Ok(Self::Not),
			_ => Err(()),
		}
	}
}

/// The full set of field-level criterion operators from the glossary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOperator
{
	Equals,
	NotEqual,
	GreaterThan,
	LessThan,
	GreaterOrEqual,
	LessOrEqual,
	Between,
	BetweenInclusive,
	IBetween,
	IBetweenInclusive,
	IEquals,
	INotEqual,

	Contains,
	StartsWith,
	EndsWith,
	IContains,
	IStartsWith,
	IEndsWith,
	NotContains,
	NotStartsWith,
	NotEndsWith,
	INotContains,
	INotStartsWith,
	INotEndsWith,

	MatchesPattern,
	IMatchesPattern,
	ContainsPattern,
	StartsWithPattern,
	EndsWithPattern,
	IContainsPattern,
	IStartsWithPattern,
	IEndsWithPattern,
	NotContainsPattern,
	NotStartsWithPattern,
	NotEndsWithPattern,
	INotContainsPattern,
	INotStartsWithPattern,
	INotEndsWithPattern,

	IsBlank,
	NotBlank,
	IsNull,
	NotNull,

	InSet,
	NotInSet,

	EqualsField,
	NotEqualField,
	IEqualsField,
	INotEqualField,
	GreaterThanField,
	LessThanField,
	GreaterOrEqualField,
	LessOrEqualField,
	ContainsField,
	StartsWithField,
	EndsWithField,
	IContainsField,
	IStartsWithField,
	IEndsWithField,
	NotContainsField,
	NotStartsWithField,
	NotEndsWithField,
	INotContainsField,
	INotStartsWithField,
	INotEndsWithField,

	/// Recognised but unsupported by the compiler (spec §4.4): logged and
	/// compiled to the empty fragment.
	Regexp,
	IRegexp,
}

macro_rules! field_operator_table {
	($($variant:ident => $name:literal),+ $(,)?) => {
		impl fmt::Display for FieldOperator {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(match self {
					$(Self::$variant => $name,)+
				})
			}
		}

		impl FromStr for FieldOperator {
			type Err = ();

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($name => Ok(Self::$variant),)+
					_ => Err(()),
				}
			}
		}
	};
}

field_operator_table! {
	Equals => "equals",
	NotEqual => "notEqual",
	GreaterThan => "greaterThan",
	LessThan => "lessThan",
	GreaterOrEqual => "greaterOrEqual",
	LessOrEqual => "lessOrEqual",
	Between => "between",
	BetweenInclusive => "betweenInclusive",
	IBetween => "iBetween",
	IBetweenInclusive => "iBetweenInclusive",
	IEquals => "iEquals",
	INotEqual => "iNotEqual",

	Contains => "contains",
	StartsWith => "startsWith",
	EndsWith => "endsWith",
	IContains => "iContains",
	IStartsWith => "iStartsWith",
	IEndsWith => "iEndsWith",
	NotContains => "notContains",
	NotStartsWith => "notStartsWith",
	NotEndsWith => "notEndsWith",
	INotContains => "iNotContains",
	INotStartsWith => "iNotStartsWith",
	INotEndsWith => "iNotEndsWith",

	MatchesPattern => "matchesPattern",
	IMatchesPattern => "iMatchesPattern",
	ContainsPattern => "containsPattern",
	StartsWithPattern => "startsWithPattern",
	EndsWithPattern => "endsWithPattern",
	IContainsPattern => "iContainsPattern",
	IStartsWithPattern => "iStartsWithPattern",
	IEndsWithPattern => "iEndsWithPattern",
	NotContainsPattern => "notContainsPattern",
	NotStartsWithPattern => "notStartsWithPattern",
	NotEndsWithPattern => "notEndsWithPattern",
	INotContainsPattern => "iNotContainsPattern",
	INotStartsWithPattern => "iNotStartsWithPattern",
	INotEndsWithPattern => "iNotEndsWithPattern",

	IsBlank => "isBlank",
	NotBlank => "notBlank",
	IsNull => "isNull",
	NotNull => "notNull",

	InSet => "inSet",
	NotInSet => "notInSet",

	EqualsField => "equalsField",
	NotEqualField => "notEqualField",
	IEqualsField => "iEqualsField",
	INotEqualField => "iNotEqualField",
	GreaterThanField => "greaterThanField",
	LessThanField => "lessThanField",
	GreaterOrEqualField => "greaterOrEqualField",
	LessOrEqualField => "lessOrEqualField",
	ContainsField => "containsField",
	StartsWithField => "startsWithField",
	EndsWithField => "endsWithField",
	IContainsField => "iContainsField",
	IStartsWithField => "iStartsWithField",
	IEndsWithField => "iEndsWithField",
	NotContainsField => "notContainsField",
	NotStartsWithField => "notStartsWithField",
	NotEndsWithField => "notEndsWithField",
	INotContainsField => "iNotContainsField",
	INotStartsWithField => "iNotStartsWithField",
	INotEndsWithField => "iNotEndsWithField",

	Regexp => "regexp",
	IRegexp => "iregexp",
}

/// A node of an `AdvancedCriteria` tree (spec §3, §4.4).
#[derive(Debug, Clone)]
pub enum Criterion
{
	Logical
	{
		operator: LogicalOperator,
		criteria: Vec<Criterion>,
		/// `true` when the wire `criteria` key was present but was not a
		/// JSON array (spec §4.4: "a non-list where a list is required
		/// emits the constant `1=2`"), as opposed to simply absent.
		malformed: bool,
	},
	Field
	{
		operator: FieldOperator,
		field_name: String,
		value: Option<Value>,
		start: Option<Value>,
		end: Option<Value>,
	},
}

impl Criterion
{
	pub fn field(operator: FieldOperator, field_name: impl Into<String>, value: impl Into<Option<Value>>) -> Self
	{
		Self::Field { operator, field_name: field_name.into(), value: value.into(), start: None, end: None }
	}

	pub fn between(operator: FieldOperator, field_name: impl Into<String>, start: Option<Value>, end: Option<Value>) -> Self
	{
		Self::Field { operator, field_name: field_name.into(), value: None, start, end }
	}
}

#[derive(Debug, Serialize, serde::Deserialize)]
struct RawCriterion
{
	operator: String,
	#[serde(default, rename = "fieldName")]
	field_name: Option<String>,
	#[serde(default)]
	criteria: Option<serde_json::Value>,
	#[serde(default)]
	value: Option<Value>,
	#[serde(default)]
	start: Option<Value>,
	#[serde(default)]
	end: Option<Value>,
}

impl<'de> Deserialize<'de> for Criterion
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = RawCriterion::deserialize(deserializer)?;

		if let Ok(logical) = raw.operator.parse::<LogicalOperator>() {
			// A missing or non-array `criteria` is a recoverable, logged
			// condition at compile time (spec §4.4), not a parse error: we
			// represent it as an empty child list here and let the compiler
			// decide what that means.
			let (children, malformed) = match raw.criteria {
				Some(serde_json::Value::Array(items)) => {
					let children = items
						.into_iter()
						.map(serde_json::from_value)
						.collect::<Result<Vec<Criterion>, _>>()
						.map_err(DeError::custom)?;
					(children, false)
				},
				Some(_) => (Vec::new(), true),
				None => (Vec::new(), false),
			};

			return Ok(Criterion::Logical { operator: logical, criteria: children, malformed });
		}

		let operator = raw
			.operator
			.parse::<FieldOperator>()
			.map_err(|()| DeError::custom(format!("unknown criterion operator `{}`", raw.operator)))?;

		let field_name = raw
			.field_name
			.ok_or_else(|| DeError::custom("field criterion is missing `fieldName`"))?;

		Ok(Criterion::Field { operator, field_name, value: raw.value, start: raw.start, end: raw.end })
	}
}

impl Serialize for Criterion
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		use serde::ser::SerializeMap;

		match self {
			Criterion::Logical { operator, criteria, .. } => {
				let mut map = serializer.serialize_map(Some(2))?;
				map.serialize_entry("operator", &operator.to_string())?;
				map.serialize_entry("criteria", criteria)?;
				map.end()
			},
			Criterion::Field { operator, field_name, value, start, end } => {
				let mut map = serializer.serialize_map(Some(4))?;
				map.serialize_entry("operator", &operator.to_string())?;
				map.serialize_entry("fieldName", field_name)?;
				if let Some(value) = value {
					map.serialize_entry("value", value)?;
				}
				if let Some(start) = start {
					map.serialize_entry("start", start)?;
				}
				if let Some(end) = end {
					map.serialize_entry("end", end)?;
				}
				map.end()
			},
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn parses_nested_logical_tree()
	{
		let raw = serde_json::json!({
			"operator": "not",
			"criteria": [
				{ "operator": "equals", "fieldName": "parent", "value": 42 },
			],
		});

		let criterion: Criterion = serde_json::from_value(raw).unwrap();
		match criterion {
			Criterion::Logical { operator: LogicalOperator::Not, criteria, .. } => {
				assert_eq!(criteria.len(), 1);
				assert!(matches!(criteria[0], Criterion::Field { operator: FieldOperator::Equals, .. }));
			},
			_ => panic!("expected a `not` node"),
		}
	}

	#[test]
	fn missing_criteria_list_becomes_empty()
	{
		let raw = serde_json::json!({ "operator": "and" });
		let criterion: Criterion = serde_json::from_value(raw).unwrap();
		assert!(matches!(criterion, Criterion::Logical { criteria, .. } if criteria.is_empty()));
	}
}
