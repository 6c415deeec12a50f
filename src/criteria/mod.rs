//! Translates an `AdvancedCriteria` tree into a parameterised SQL fragment
//! (spec §4.4).
//!
//! Every emitted fragment binds user values as parameters; only identifiers
//! and constant SQL keywords are string-embedded (spec §4.4 invariant). The
//! escape character used by all `LIKE`-style predicates is a compile-time
//! constant, embedded literally in the fragment text rather than bound as a
//! parameter, since it is a fixed configuration constant rather than a user
//! value.

use dsbroker_wire::{Criterion, FieldOperator, LogicalOperator, Value};

use crate::datasource::descriptor::{DataSourceDescriptor, FieldDescriptor};

pub const LIKE_ESCAPE_CHAR: char = '~';

/// A compiled `WHERE`-clause fragment: SQL text with `?` placeholders, and
/// the values that bind to them in order.
#[derive(Debug, Clone, Default)]
pub struct CompiledFragment
{
	pub sql: String,
	pub params: Vec<Value>,
}

impl CompiledFragment
{
	fn constant(sql: &str) -> Self
	{
		Self { sql: sql.to_owned(), params: Vec::new() }
	}

	fn empty() -> Self
	{
		Self::default()
	}

	fn is_empty(&self) -> bool
	{
		self.sql.is_empty()
	}
}

/// Compiles one criterion node against `descriptor`.
///
/// `strict_sql_filtering` selects between spec §4.4's two null-handling
/// flavours: strict mode emits the predicate exactly as SQL's three-valued
/// logic defines it; lenient mode (the default) adds explicit null handling
/// so negation behaves set-theoretically.
pub fn compile(criterion: &Criterion, descriptor: &DataSourceDescriptor, strict_sql_filtering: bool) -> CompiledFragment
{
	match criterion {
		Criterion::Logical { operator, criteria, malformed } => {
			compile_logical(*operator, criteria, *malformed, descriptor, strict_sql_filtering)
		},
		Criterion::Field { operator, field_name, value, start, end } => {
			compile_field(*operator, field_name, value.as_ref(), start.as_ref(), end.as_ref(), descriptor, strict_sql_filtering)
		},
	}
}

fn compile_logical(
	operator: LogicalOperator,
	children: &[Criterion],
	malformed: bool,
	descriptor: &DataSourceDescriptor,
	strict: bool,
) -> CompiledFragment
{
	if malformed {
		tracing::warn!(?operator, "logical criterion's `criteria` was not a list; emitting `1=2`");
		return CompiledFragment::constant("1=2");
	}
	if children.is_empty() {
		tracing::debug!(?operator, "logical criterion has no children; omitting");
		return CompiledFragment::empty();
	}

	let compiled: Vec<CompiledFragment> =
		children.iter().map(|c| compile(c, descriptor, strict)).filter(|f| !f.is_empty()).collect();

	if compiled.is_empty() {
		return CompiledFragment::empty();
	}

	match operator {
		LogicalOperator::And => join(compiled, "AND"),
		LogicalOperator::Or => join(compiled, "OR"),
		LogicalOperator::Not => {
			let inner = join(compiled, "OR");
			CompiledFragment { sql: format!("NOT ({})", inner.sql), params: inner.params }
		},
	}
}

fn join(fragments: Vec<CompiledFragment>, op: &str) -> CompiledFragment
{
	let mut sql = String::new();
	let mut params = Vec::new();
	for (i, frag) in fragments.into_iter().enumerate() {
		if i > 0 {
			sql.push(' ');
			sql.push_str(op);
			sql.push(' ');
		}
		sql.push('(');
		sql.push_str(&frag.sql);
		sql.push(')');
		params.extend(frag.params);
	}
	CompiledFragment { sql, params }
}

fn compile_field(
	operator: FieldOperator,
	field_name: &str,
	value: Option<&Value>,
	start: Option<&Value>,
	end: Option<&Value>,
	descriptor: &DataSourceDescriptor,
	strict: bool,
) -> CompiledFragment
{
	use FieldOperator::*;

	let column = descriptor.get_field(field_name).map(FieldDescriptor::sql_column).unwrap_or(field_name).to_owned();
	let column = column.as_str();

	match operator {
		Equals => compile_equals(column, value, strict, false),
		IEquals => compile_equals(column, value, strict, true),
		NotEqual => compile_not_equal(column, value, strict, false),
		INotEqual => compile_not_equal(column, value, strict, true),
		GreaterThan => compile_bound(column, value, ">", false, strict),
		LessThan => compile_bound(column, value, "<", false, strict),
		GreaterOrEqual => compile_bound(column, value, ">=", false, strict),
		LessOrEqual => compile_bound(column, value, "<=", false, strict),
		Between => compile_between(column, start, end, false, false, strict),
		BetweenInclusive => compile_between(column, start, end, true, false, strict),
		IBetween => compile_between(column, start, end, false, true, strict),
		IBetweenInclusive => compile_between(column, start, end, true, true, strict),

		Contains | StartsWith | EndsWith | IContains | IStartsWith | IEndsWith | NotContains | NotStartsWith
		| NotEndsWith | INotContains | INotStartsWith | INotEndsWith => {
			let value = value.cloned().unwrap_or(Value::Null);
			compile_substring(operator, column, &value, strict)
		},

		MatchesPattern | IMatchesPattern | ContainsPattern | StartsWithPattern | EndsWithPattern | IContainsPattern
		| IStartsWithPattern | IEndsWithPattern | NotContainsPattern | NotStartsWithPattern | NotEndsWithPattern
		| INotContainsPattern | INotStartsWithPattern | INotEndsWithPattern => {
			let value = value.cloned().unwrap_or(Value::Null);
			compile_pattern(operator, column, &value, strict)
		},

		IsBlank | NotBlank | IsNull | NotNull => compile_null_blank(operator, column),

		InSet | NotInSet => compile_set(operator, column, value, strict),

		EqualsField | NotEqualField | IEqualsField | INotEqualField | GreaterThanField | LessThanField
		| GreaterOrEqualField | LessOrEqualField | ContainsField | StartsWithField | EndsWithField | IContainsField
		| IStartsWithField | IEndsWithField | NotContainsField | NotStartsWithField | NotEndsWithField
		| INotContainsField | INotStartsWithField | INotEndsWithField => {
			let other_field = value.and_then(Value::as_text).unwrap_or_default().to_owned();
			compile_cross_field(operator, column, &other_field, descriptor)
		},

		Regexp | IRegexp => {
			tracing::warn!(?operator, field = field_name, "unsupported criterion operator; emitting empty fragment");
			CompiledFragment::empty()
		},
	}
}

fn compile_equals(column: &str, value: Option<&Value>, strict: bool, case_insensitive: bool) -> CompiledFragment
{
	let value = value.cloned().unwrap_or(Value::Null);
	let (col_expr, val_expr) = fold_expr(column, case_insensitive);

	if strict {
		return CompiledFragment { sql: format!("{col_expr} = {val_expr}"), params: vec![value] };
	}
	if value.is_null() {
		CompiledFragment::constant(&format!("{column} IS NULL"))
	} else {
		CompiledFragment { sql: format!("{col_expr} = {val_expr} AND {column} IS NOT NULL"), params: vec![value] }
	}
}

fn compile_not_equal(column: &str, value: Option<&Value>, strict: bool, case_insensitive: bool) -> CompiledFragment
{
	let value = value.cloned().unwrap_or(Value::Null);
	let (col_expr, val_expr) = fold_expr(column, case_insensitive);

	if strict {
		return CompiledFragment { sql: format!("{col_expr} <> {val_expr}"), params: vec![value] };
	}
	if value.is_null() {
		CompiledFragment::constant(&format!("{column} IS NOT NULL"))
	} else {
		CompiledFragment { sql: format!("{col_expr} <> {val_expr} OR {column} IS NULL"), params: vec![value] }
	}
}

/// One half of an open-ended comparison (`>`, `<`, `>=`, `<=`); also the
/// building block `between`/`betweenInclusive` join into a conjunction
/// (spec §4.4: "behave as a conjunction of the two open-ended forms").
fn compile_bound(column: &str, value: Option<&Value>, op: &str, case_insensitive: bool, strict: bool) -> CompiledFragment
{
	let value = value.cloned().unwrap_or(Value::Null);
	if !strict && value.is_null() {
		return CompiledFragment::constant("1=1");
	}
	let (col_expr, val_expr) = fold_expr(column, case_insensitive);
	CompiledFragment { sql: format!("{col_expr} {op} {val_expr}"), params: vec![value] }
}

fn compile_between(
	column: &str,
	start: Option<&Value>,
	end: Option<&Value>,
	inclusive: bool,
	case_insensitive: bool,
	strict: bool,
) -> CompiledFragment
{
	let ge_op = if inclusive { ">=" } else { ">" };
	let le_op = if inclusive { "<=" } else { "<" };
	let lower = compile_bound(column, start, ge_op, case_insensitive, strict);
	let upper = compile_bound(column, end, le_op, case_insensitive, strict);

	match (lower.is_empty(), upper.is_empty()) {
		(true, true) => CompiledFragment::constant("1=1"),
		(true, false) => upper,
		(false, true) => lower,
		(false, false) => join(vec![lower, upper], "AND"),
	}
}

fn compile_null_blank(operator: FieldOperator, column: &str) -> CompiledFragment
{
	use FieldOperator::*;
	match operator {
		IsNull => CompiledFragment::constant(&format!("{column} IS NULL")),
		NotNull => CompiledFragment::constant(&format!("{column} IS NOT NULL")),
		IsBlank => CompiledFragment::constant(&format!("({column} IS NULL OR {column} = '')")),
		NotBlank => CompiledFragment::constant(&format!("({column} IS NOT NULL AND {column} <> '')")),
		_ => unreachable!("compile_null_blank called with non-null/blank operator"),
	}
}

/// `inSet`/`notInSet` (spec §4.4: "splits into `col IN (non-nulls)` OR `col
/// IS NULL` when nulls are present").
fn compile_set(operator: FieldOperator, column: &str, value: Option<&Value>, strict: bool) -> CompiledFragment
{
	let items: Vec<Value> = match value {
		Some(Value::List(items)) => items.clone(),
		Some(other) if !other.is_null() => vec![other.clone()],
		_ => Vec::new(),
	};
	let has_null = matches!(value, Some(Value::List(items)) if items.iter().any(Value::is_null));
	let non_null: Vec<Value> = items.into_iter().filter(|v| !v.is_null()).collect();

	let mut fragment = if non_null.is_empty() {
		CompiledFragment::empty()
	} else {
		let placeholders = vec!["?"; non_null.len()].join(", ");
		CompiledFragment { sql: format!("{column} IN ({placeholders})"), params: non_null }
	};

	if has_null && !strict {
		fragment = if fragment.is_empty() {
			CompiledFragment::constant(&format!("{column} IS NULL"))
		} else {
			join(vec![fragment, CompiledFragment::constant(&format!("{column} IS NULL"))], "OR")
		};
	}

	if fragment.is_empty() {
		// An empty set matches nothing.
		fragment = CompiledFragment::constant("1=2");
	}

	match operator {
		FieldOperator::InSet => fragment,
		FieldOperator::NotInSet => CompiledFragment { sql: format!("NOT ({})", fragment.sql), params: fragment.params },
		_ => unreachable!("compile_set called with non-set operator"),
	}
}

enum Wildcard
{
	None,
	Leading,
	Trailing,
	Both,
}

fn wrap_wildcard(escaped: &str, kind: Wildcard) -> String
{
	match kind {
		Wildcard::None => escaped.to_owned(),
		Wildcard::Leading => format!("%{escaped}"),
		Wildcard::Trailing => format!("{escaped}%"),
		Wildcard::Both => format!("%{escaped}%"),
	}
}

/// Builds the common `LIKE`/`NOT LIKE` SQL shared by the substring and
/// pattern operator families (spec §4.4: "Then they apply the like-style
/// form").
fn build_like(column: &str, pattern: String, negate: bool, case_insensitive: bool, strict: bool) -> CompiledFragment
{
	let (col_expr, val_expr) = fold_expr(column, case_insensitive);
	let mut sql = format!("{col_expr} LIKE {val_expr} ESCAPE '{LIKE_ESCAPE_CHAR}'");
	if negate {
		sql = format!("NOT ({sql})");
	}
	if !strict {
		// spec §4.4: "All contains/startsWith/endsWith and their negations
		// add col IS NOT NULL so negation does not accidentally include
		// null rows."
		sql = format!("{sql} AND {column} IS NOT NULL");
	}
	CompiledFragment { sql, params: vec![Value::Text(pattern)] }
}

fn fold_expr(column: &str, case_insensitive: bool) -> (String, String)
{
	if case_insensitive {
		(format!("upper(''||{column})"), "upper(?)".to_owned())
	} else {
		(column.to_owned(), "?".to_owned())
	}
}

/// Escapes `_`, `%`, and the escape character itself with the escape
/// character (spec §4.4: "Like-style operators escape `_`, `%`, and the
/// escape character itself … in user values before concatenating wildcards").
pub(crate) fn like_escape(raw: &str) -> String
{
	let mut out = String::with_capacity(raw.len());
	for c in raw.chars() {
		if c == '_' || c == '%' || c == LIKE_ESCAPE_CHAR {
			out.push(LIKE_ESCAPE_CHAR);
		}
		out.push(c);
	}
	out
}

/// Translates a user pattern (spec §4.4): `*` -> `%`, `?` -> `_`, backslash
/// escapes the next character literally, and `_`/`%`/the escape character
/// are SQL-escaped.
fn translate_pattern(raw: &str) -> String
{
	let mut out = String::with_capacity(raw.len());
	let mut chars = raw.chars();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				if let Some(next) = chars.next() {
					push_escaped_literal(&mut out, next);
				}
			},
			'*' => out.push('%'),
			'?' => out.push('_'),
			'_' | '%' => push_escaped_literal(&mut out, c),
			other if other == LIKE_ESCAPE_CHAR => push_escaped_literal(&mut out, other),
			other => out.push(other),
		}
	}
	out
}

fn push_escaped_literal(out: &mut String, c: char)
{
	out.push(LIKE_ESCAPE_CHAR);
	out.push(c);
}

pub(crate) fn value_as_text(value: &Value) -> String
{
	match value {
		Value::Text(s) | Value::DateTime(s) => s.clone(),
		Value::Int(i) => i.to_string(),
		Value::Float(f) => f.to_string(),
		Value::Bool(b) => b.to_string(),
		Value::Null | Value::Bytes(_) | Value::List(_) => String::new(),
	}
}

fn compile_substring(operator: FieldOperator, column: &str, value: &Value, strict: bool) -> CompiledFragment
{
	use FieldOperator::*;
	let (kind, negate, ci) = match operator {
		Contains => (Wildcard::Both, false, false),
		StartsWith => (Wildcard::Trailing, false, false),
		EndsWith => (Wildcard::Leading, false, false),
		IContains => (Wildcard::Both, false, true),
		IStartsWith => (Wildcard::Trailing, false, true),
		IEndsWith => (Wildcard::Leading, false, true),
		NotContains => (Wildcard::Both, true, false),
		NotStartsWith => (Wildcard::Trailing, true, false),
		NotEndsWith => (Wildcard::Leading, true, false),
		INotContains => (Wildcard::Both, true, true),
		INotStartsWith => (Wildcard::Trailing, true, true),
		INotEndsWith => (Wildcard::Leading, true, true),
		_ => unreachable!("compile_substring called with non-substring operator"),
	};
	let pattern = wrap_wildcard(&like_escape(&value_as_text(value)), kind);
	build_like(column, pattern, negate, ci, strict)
}

fn compile_pattern(operator: FieldOperator, column: &str, value: &Value, strict: bool) -> CompiledFragment
{
	use FieldOperator::*;
	let (kind, negate, ci) = match operator {
		MatchesPattern => (Wildcard::None, false, false),
		IMatchesPattern => (Wildcard::None, false, true),
		ContainsPattern => (Wildcard::Both, false, false),
		StartsWithPattern => (Wildcard::Trailing, false, false),
		EndsWithPattern => (Wildcard::Leading, false, false),
		IContainsPattern => (Wildcard::Both, false, true),
		IStartsWithPattern => (Wildcard::Trailing, false, true),
		IEndsWithPattern => (Wildcard::Leading, false, true),
		NotContainsPattern => (Wildcard::Both, true, false),
		NotStartsWithPattern => (Wildcard::Trailing, true, false),
		NotEndsWithPattern => (Wildcard::Leading, true, false),
		INotContainsPattern => (Wildcard::Both, true, true),
		INotStartsWithPattern => (Wildcard::Trailing, true, true),
		INotEndsWithPattern => (Wildcard::Leading, true, true),
		_ => unreachable!("compile_pattern called with non-pattern operator"),
	};
	let pattern = wrap_wildcard(&translate_pattern(&value_as_text(value)), kind);
	build_like(column, pattern, negate, ci, strict)
}

fn compile_cross_field(operator: FieldOperator, column: &str, other_field_name: &str, descriptor: &DataSourceDescriptor) -> CompiledFragment
{
	use FieldOperator::*;

	let Some(other) = descriptor.get_field(other_field_name) else {
		tracing::warn!(field = other_field_name, "cross-field criterion references unknown field; emitting `1=1`");
		return CompiledFragment::constant("1=1");
	};
	let other_column = other.sql_column();

	let sql = match operator {
		EqualsField => format!("{column} = {other_column}"),
		NotEqualField => format!("{column} <> {other_column}"),
		IEqualsField => format!("upper(''||{column}) = upper(''||{other_column})"),
		INotEqualField => format!("upper(''||{column}) <> upper(''||{other_column})"),
		GreaterThanField => format!("{column} > {other_column}"),
		LessThanField => format!("{column} < {other_column}"),
		GreaterOrEqualField => format!("{column} >= {other_column}"),
		LessOrEqualField => format!("{column} <= {other_column}"),
		ContainsField => format!("{column} LIKE ('%' || {other_column} || '%')"),
		StartsWithField => format!("{column} LIKE ({other_column} || '%')"),
		EndsWithField => format!("{column} LIKE ('%' || {other_column})"),
		IContainsField => format!("upper(''||{column}) LIKE ('%' || upper(''||{other_column}) || '%')"),
		IStartsWithField => format!("upper(''||{column}) LIKE (upper(''||{other_column}) || '%')"),
		IEndsWithField => format!("upper(''||{column}) LIKE ('%' || upper(''||{other_column}))"),
		NotContainsField => format!("{column} NOT LIKE ('%' || {other_column} || '%')"),
		NotStartsWithField => format!("{column} NOT LIKE ({other_column} || '%')"),
		NotEndsWithField => format!("{column} NOT LIKE ('%' || {other_column})"),
		INotContainsField => format!("upper(''||{column}) NOT LIKE ('%' || upper(''||{other_column}) || '%')"),
		INotStartsWithField => format!("upper(''||{column}) NOT LIKE (upper(''||{other_column}) || '%')"),
		INotEndsWithField => format!("upper(''||{column}) NOT LIKE ('%' || upper(''||{other_column}))"),
		_ => unreachable!("compile_cross_field called with non-cross-field operator"),
	};
	CompiledFragment::constant(&sql)
}

#[cfg(test)]
mod tests
{
	use dsbroker_wire::LogicalOperator;

	use super::*;
	use crate::datasource::descriptor::{FieldDescriptor, FieldType, ServerType};

	fn country_descriptor() -> DataSourceDescriptor
	{
		DataSourceDescriptor {
			id: "country".to_owned(),
			server_type: ServerType::Sql,
			fields: vec![
				FieldDescriptor { name: "id".into(), native_name: None, field_type: FieldType::Sequence, primary_key: true },
				FieldDescriptor { name: "name".into(), native_name: None, field_type: FieldType::Text, primary_key: false },
				FieldDescriptor { name: "continent".into(), native_name: None, field_type: FieldType::Text, primary_key: false },
				FieldDescriptor { name: "parent".into(), native_name: None, field_type: FieldType::Integer, primary_key: false },
			],
			table_name: None,
			db_name: None,
			file_name: None,
			json_prefix: None,
			json_suffix: None,
		}
	}

	#[test]
	fn scenario_1_simple_substring_fetch()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::field(FieldOperator::Contains, "continent", Value::Text("Europe".into()));
		let fragment = compile(&criterion, &descriptor, false);

		assert_eq!(fragment.sql, "upper(''||continent) LIKE upper(?) ESCAPE '~' AND continent IS NOT NULL");
		assert_eq!(fragment.params, vec![Value::Text("%Europe%".into())]);
	}

	#[test]
	fn scenario_2_negated_equals_includes_nulls()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::Logical {
			operator: LogicalOperator::Not,
			criteria: vec![Criterion::field(FieldOperator::Equals, "parent", Value::Int(42))],
			malformed: false,
		};
		let fragment = compile(&criterion, &descriptor, false);

		assert_eq!(fragment.sql, "NOT ((parent = ? AND parent IS NOT NULL))");
		assert_eq!(fragment.params, vec![Value::Int(42)]);
	}

	#[test]
	fn malformed_logical_criteria_emits_false_constant()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::Logical { operator: LogicalOperator::And, criteria: Vec::new(), malformed: true };
		let fragment = compile(&criterion, &descriptor, false);
		assert_eq!(fragment.sql, "1=2");
	}

	#[test]
	fn missing_logical_criteria_is_omitted()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::Logical { operator: LogicalOperator::And, criteria: Vec::new(), malformed: false };
		let fragment = compile(&criterion, &descriptor, false);
		assert!(fragment.is_empty());
	}

	#[test]
	fn strict_mode_skips_null_handling()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::field(FieldOperator::Equals, "name", Value::Text("foo".into()));
		let fragment = compile(&criterion, &descriptor, true);
		assert_eq!(fragment.sql, "name = ?");
	}

	#[test]
	fn in_set_with_null_splits_into_or()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::field(
			FieldOperator::InSet,
			"continent",
			Value::List(vec![Value::Text("Europe".into()), Value::Null]),
		);
		let fragment = compile(&criterion, &descriptor, false);
		assert_eq!(fragment.sql, "(continent IN (?)) OR (continent IS NULL)");
		assert_eq!(fragment.params, vec![Value::Text("Europe".into())]);
	}

	#[test]
	fn pattern_operator_translates_wildcards()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::field(FieldOperator::MatchesPattern, "name", Value::Text("Sa?t*".into()));
		let fragment = compile(&criterion, &descriptor, false);
		assert_eq!(fragment.params, vec![Value::Text("Sa_t%".into())]);
	}

	#[test]
	fn cross_field_unknown_field_emits_true_constant()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::field(FieldOperator::EqualsField, "name", Value::Text("missing".into()));
		let fragment = compile(&criterion, &descriptor, false);
		assert_eq!(fragment.sql, "1=1");
	}

	#[test]
	fn unsupported_regexp_emits_empty_fragment()
	{
		let descriptor = country_descriptor();
		let criterion = Criterion::field(FieldOperator::Regexp, "name", Value::Text(".*".into()));
		let fragment = compile(&criterion, &descriptor, false);
		assert!(fragment.is_empty());
	}
}
