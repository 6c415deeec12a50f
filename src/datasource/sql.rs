//! `serverType: "sql"` (spec §4.3.1).

use dsbroker_wire::{DsOperationSpec, TextMatchStyle, Value};
use serde_json::Value as Json;
use sqlx::any::AnyRow;
use sqlx::Row;

use super::descriptor::{DataSourceDescriptor, FieldDescriptor, FieldType};
use super::error::{DataSourceError, DataSourceResult};
use super::{ExecuteOutcome, Record};
use crate::criteria::{self, CompiledFragment};
use crate::database::{Connection, ConnectionPool, SqlDialect};

pub struct SqlDataSource
{
	descriptor: DataSourceDescriptor,
	connection: Option<Connection>,
	db_type: Option<SqlDialect>,
}

impl SqlDataSource
{
	pub fn new(descriptor: DataSourceDescriptor) -> Self
	{
		Self { descriptor, connection: None, db_type: None }
	}

	pub fn descriptor(&self) -> &DataSourceDescriptor
	{
		&self.descriptor
	}

	fn db_type(&self) -> SqlDialect
	{
		self.db_type.expect("SqlDataSource executed before init")
	}

	fn connection(&mut self) -> &mut Connection
	{
		self.connection.as_mut().expect("SqlDataSource executed before init")
	}

	fn column_for(&self, field_name: &str) -> String
	{
		self.descriptor.get_field(field_name).map(FieldDescriptor::sql_column).unwrap_or(field_name).to_owned()
	}

	/// Acquires this instance's own [`Connection`] (spec §4.5.1: "the
	/// DataSource then acquires a Connection").
	pub async fn init(&mut self, connection_pool: &ConnectionPool) -> DataSourceResult<()>
	{
		let db_name = self.descriptor.db_name.clone();
		let conn = connection_pool
			.acquire(db_name.as_deref())
			.await
			.map_err(|e| DataSourceError::ResourceAcquisitionFailed(self.descriptor.id.clone(), e))?;
		let db_type = connection_pool
			.get_db_type(db_name.as_deref())
			.await
			.map_err(|e| DataSourceError::ResourceAcquisitionFailed(self.descriptor.id.clone(), e))?;
		self.connection = Some(conn);
		self.db_type = Some(db_type);
		Ok(())
	}

	pub async fn start_transaction(&mut self) -> DataSourceResult<()>
	{
		let conn = self.connection();
		sqlx::query("BEGIN").execute(conn.as_raw()).await.map_err(DataSourceError::from)?;
		Ok(())
	}

	pub async fn commit(&mut self) -> DataSourceResult<()>
	{
		let conn = self.connection();
		sqlx::query("COMMIT").execute(conn.as_raw()).await.map_err(DataSourceError::TransactionFailed)?;
		Ok(())
	}

	pub async fn rollback(&mut self) -> DataSourceResult<()>
	{
		let conn = self.connection();
		sqlx::query("ROLLBACK").execute(conn.as_raw()).await.map_err(DataSourceError::from)?;
		Ok(())
	}

	pub async fn free_resources(&mut self, connection_pool: &ConnectionPool)
	{
		if let Some(conn) = self.connection.take() {
			let db_name = self.descriptor.db_name.clone();
			if let Err(error) = connection_pool.release(db_name.as_deref(), conn).await {
				tracing::warn!(%error, data_source = %self.descriptor.id, "failed to release SQL connection");
			}
		}
	}

	/// Build + run `SELECT <fields> FROM <table> [WHERE ...] [ORDER BY ...]
	/// [LIMIT ? OFFSET ?]` (spec §4.3.1 fetch path).
	pub async fn execute_fetch(&mut self, op: &DsOperationSpec, strict_sql_filtering: bool) -> DataSourceResult<ExecuteOutcome>
	{
		let columns = self.select_columns();
		let table = self.descriptor.table_name().to_owned();

		let mut params: Vec<Value> = Vec::new();
		let where_clause = if let Some(criterion) = &op.advanced_criteria {
			let compiled = criteria::compile(criterion, &self.descriptor, strict_sql_filtering);
			params.extend(compiled.params);
			(!compiled.sql.is_empty()).then_some(compiled.sql)
		} else if let Some(simple) = &op.simple_criteria {
			self.compile_simple_criteria(simple, op.text_match_style.unwrap_or(TextMatchStyle::Substring), &mut params)
		} else {
			None
		};

		let mut sql = format!("SELECT {columns} FROM {table}");
		if let Some(clause) = where_clause {
			sql.push_str(" WHERE ");
			sql.push_str(&clause);
		}
		if !op.sort_by.is_empty() {
			let order = op
				.sort_by
				.iter()
				.map(|entry| match entry.strip_prefix('-') {
					Some(field) => format!("{} DESC", self.column_for(field)),
					None => format!("{} ASC", self.column_for(entry)),
				})
				.collect::<Vec<_>>()
				.join(", ");
			sql.push_str(" ORDER BY ");
			sql.push_str(&order);
		}

		let start_row = op.start_row.unwrap_or(0);
		if let Some(end_row) = op.end_row {
			sql.push_str(" LIMIT ? OFFSET ?");
			params.push(Value::Int(end_row.saturating_sub(start_row) as i64));
			params.push(Value::Int(start_row as i64));
		}

		let sql = rewrite_placeholders(&sql, self.db_type());
		let mut query = sqlx::query(&sql);
		for param in params {
			query = bind_value(query, param);
		}

		let conn = self.connection();
		let rows = query.fetch_all(conn.as_raw()).await.map_err(DataSourceError::from)?;
		let records = rows.iter().map(|row| self.decode_row(row)).collect::<DataSourceResult<Vec<_>>>()?;
		let total_rows = records.len() as u64;

		Ok(ExecuteOutcome::Fetch { rows: records, start_row, end_row: start_row + total_rows, total_rows })
	}

	/// Future true-count mode (`COUNT(*)` over the same filter), deliberately
	/// left uncalled: `totalRows` reports the windowed row count per spec
	/// §4.3.1 and the recorded Open Question decision in DESIGN.md.
	#[allow(dead_code)]
	pub async fn count_matching(&mut self, op: &DsOperationSpec, strict_sql_filtering: bool) -> DataSourceResult<u64>
	{
		let table = self.descriptor.table_name().to_owned();
		let mut params: Vec<Value> = Vec::new();
		let where_clause = if let Some(criterion) = &op.advanced_criteria {
			let compiled = criteria::compile(criterion, &self.descriptor, strict_sql_filtering);
			params.extend(compiled.params);
			(!compiled.sql.is_empty()).then_some(compiled.sql)
		} else if let Some(simple) = &op.simple_criteria {
			self.compile_simple_criteria(simple, op.text_match_style.unwrap_or(TextMatchStyle::Substring), &mut params)
		} else {
			None
		};

		let mut sql = format!("SELECT COUNT(*) FROM {table}");
		if let Some(clause) = where_clause {
			sql.push_str(" WHERE ");
			sql.push_str(&clause);
		}
		let sql = rewrite_placeholders(&sql, self.db_type());
		let mut query = sqlx::query_scalar::<_, i64>(&sql);
		for param in params {
			query = bind_scalar(query, param);
		}
		let conn = self.connection();
		let count = query.fetch_one(conn.as_raw()).await.map_err(DataSourceError::from)?;
		Ok(count as u64)
	}

	/// Insert `values`, capturing any `sequence` field's generated key, then
	/// re-select by the now-complete PK (spec §4.3.1 add path).
	pub async fn execute_add(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		let mut record: Record = op.values.iter().map(|(k, v)| (k.clone(), Value::from(v.clone()))).collect();

		let sequence_field = self.descriptor.fields.iter().find(|f| f.field_type == FieldType::Sequence).cloned();
		let insertable: Vec<FieldDescriptor> = self
			.descriptor
			.fields
			.iter()
			.filter(|f| f.field_type != FieldType::Sequence || record.contains_key(&f.name))
			.cloned()
			.collect();

		let columns = insertable.iter().map(FieldDescriptor::sql_column).collect::<Vec<_>>().join(", ");
		let placeholders = vec!["?"; insertable.len()].join(", ");
		let sql = format!("INSERT INTO {} ({columns}) VALUES ({placeholders})", self.descriptor.table_name());
		let sql = rewrite_placeholders(&sql, self.db_type());

		let mut query = sqlx::query(&sql);
		for field in &insertable {
			query = bind_value(query, record.get(&field.name).cloned().unwrap_or(Value::Null));
		}
		let conn = self.connection();
		query.execute(conn.as_raw()).await.map_err(DataSourceError::from)?;

		if let Some(field) = sequence_field {
			let id = self.last_insert_id().await?;
			record.insert(field.name, Value::Int(id));
		}

		let pk = self.pk_from_record(&record)?;
		let row = self.fetch_one_by_pk(&pk).await?;
		Ok(ExecuteOutcome::Row(row))
	}

	/// Require a full PK in `criteria`, update non-PK fields from `values`
	/// (spec §4.3.1 update path).
	pub async fn execute_update(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		let pk = self.extract_pk(op)?;
		let set_fields: Vec<(String, Value)> = self
			.descriptor
			.non_pk_fields()
			.filter_map(|f| op.values.get(&f.name).map(|v| (f.sql_column().to_owned(), Value::from(v.clone()))))
			.collect();

		let set_clause = set_fields.iter().map(|(col, _)| format!("{col} = ?")).collect::<Vec<_>>().join(", ");
		let where_clause = pk.iter().map(|(col, _)| format!("{col} = ?")).collect::<Vec<_>>().join(" AND ");
		let sql = format!("UPDATE {} SET {set_clause} WHERE {where_clause}", self.descriptor.table_name());
		let sql = rewrite_placeholders(&sql, self.db_type());

		let mut query = sqlx::query(&sql);
		for (_, value) in &set_fields {
			query = bind_value(query, value.clone());
		}
		for (_, value) in &pk {
			query = bind_value(query, value.clone());
		}

		let conn = self.connection();
		let result = query.execute(conn.as_raw()).await.map_err(DataSourceError::from)?;
		if result.rows_affected() < 1 {
			return Err(DataSourceError::RowNotFound);
		}

		let row = self.fetch_one_by_pk(&pk).await?;
		Ok(ExecuteOutcome::Row(row))
	}

	/// Require a full PK in `criteria`, delete, return the PK tuple (spec
	/// §4.3.1 remove path).
	pub async fn execute_remove(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		let pk = self.extract_pk(op)?;
		let where_clause = pk.iter().map(|(col, _)| format!("{col} = ?")).collect::<Vec<_>>().join(" AND ");
		let sql = format!("DELETE FROM {} WHERE {where_clause}", self.descriptor.table_name());
		let sql = rewrite_placeholders(&sql, self.db_type());

		let mut query = sqlx::query(&sql);
		for (_, value) in &pk {
			query = bind_value(query, value.clone());
		}
		let conn = self.connection();
		let result = query.execute(conn.as_raw()).await.map_err(DataSourceError::from)?;
		if result.rows_affected() < 1 {
			return Err(DataSourceError::RowNotFound);
		}

		let record = pk.into_iter().map(|(col, value)| (self.field_name_for_column(&col), value)).collect();
		Ok(ExecuteOutcome::Row(record))
	}

	fn field_name_for_column(&self, column: &str) -> String
	{
		self.descriptor.fields.iter().find(|f| f.sql_column() == column).map(|f| f.name.clone()).unwrap_or_else(|| column.to_owned())
	}

	fn select_columns(&self) -> String
	{
		self.descriptor.fields.iter().map(|f| format!("{} AS {}", f.sql_column(), f.name)).collect::<Vec<_>>().join(", ")
	}

	fn pk_from_record(&self, record: &Record) -> DataSourceResult<Vec<(String, Value)>>
	{
		self.descriptor
			.pk_fields()
			.map(|f| {
				record
					.get(&f.name)
					.cloned()
					.filter(|v| !v.is_null())
					.map(|v| (f.sql_column().to_owned(), v))
					.ok_or_else(|| DataSourceError::MissingPrimaryKey(f.name.clone()))
			})
			.collect()
	}

	fn extract_pk(&self, op: &DsOperationSpec) -> DataSourceResult<Vec<(String, Value)>>
	{
		self.descriptor
			.pk_fields()
			.map(|f| {
				let raw = op
					.simple_criteria
					.as_ref()
					.and_then(|m| m.get(&f.name))
					.or_else(|| op.values.get(&f.name))
					.filter(|v| !v.is_null());
				raw.map(|v| (f.sql_column().to_owned(), Value::from(v.clone())))
					.ok_or_else(|| DataSourceError::MissingPrimaryKey(f.name.clone()))
			})
			.collect()
	}

	async fn fetch_one_by_pk(&mut self, pk: &[(String, Value)]) -> DataSourceResult<Record>
	{
		let columns = self.select_columns();
		let table = self.descriptor.table_name().to_owned();
		let where_clause = pk.iter().map(|(col, _)| format!("{col} = ?")).collect::<Vec<_>>().join(" AND ");
		let sql = format!("SELECT {columns} FROM {table} WHERE {where_clause}");
		let sql = rewrite_placeholders(&sql, self.db_type());

		let mut query = sqlx::query(&sql);
		for (_, value) in pk {
			query = bind_value(query, value.clone());
		}
		let conn = self.connection();
		let row = query.fetch_optional(conn.as_raw()).await.map_err(DataSourceError::from)?;
		let row = row.ok_or(DataSourceError::RowNotFound)?;
		self.decode_row(&row)
	}

	async fn last_insert_id(&mut self) -> DataSourceResult<i64>
	{
		let sql = match self.db_type() {
			SqlDialect::Sqlite => "SELECT last_insert_rowid()",
			SqlDialect::MySql => "SELECT LAST_INSERT_ID()",
			SqlDialect::Postgres => "SELECT lastval()",
		};
		let conn = self.connection();
		sqlx::query_scalar::<_, i64>(sql).fetch_one(conn.as_raw()).await.map_err(DataSourceError::from)
	}

	/// "Otherwise treat each top-level key as a simple field predicate: for
	/// scalar, add a `substring` filter under `textMatchStyle`; for arrays,
	/// OR over each element; `null` and `undefined` match `IS NULL`" (spec
	/// §4.3.1).
	fn compile_simple_criteria(
		&self,
		map: &serde_json::Map<String, Json>,
		style: TextMatchStyle,
		params: &mut Vec<Value>,
	) -> Option<String>
	{
		let mut clauses = Vec::new();
		for (field_name, raw) in map {
			let column = self.column_for(field_name);
			match raw {
				Json::Null => clauses.push(format!("{column} IS NULL")),
				Json::Array(items) => {
					let ors = items.iter().map(|item| self.simple_predicate(&column, item, style, params)).collect::<Vec<_>>();
					if !ors.is_empty() {
						clauses.push(format!("({})", ors.join(" OR ")));
					}
				},
				scalar => clauses.push(self.simple_predicate(&column, scalar, style, params)),
			}
		}
		(!clauses.is_empty()).then(|| clauses.join(" AND "))
	}

	fn simple_predicate(&self, column: &str, raw: &Json, style: TextMatchStyle, params: &mut Vec<Value>) -> String
	{
		if raw.is_null() {
			return format!("{column} IS NULL");
		}
		let value = Value::from(raw.clone());
		match style {
			TextMatchStyle::ExactCase => {
				params.push(value);
				format!("{column} = ?")
			},
			TextMatchStyle::Exact => {
				params.push(value);
				format!("upper(''||{column}) = upper(?)")
			},
			TextMatchStyle::StartsWith => {
				let pattern = format!("{}%", criteria::like_escape(&criteria::value_as_text(&value)));
				params.push(Value::Text(pattern));
				format!("upper(''||{column}) LIKE upper(?) ESCAPE '{}'", criteria::LIKE_ESCAPE_CHAR)
			},
			TextMatchStyle::Substring => {
				let pattern = format!("%{}%", criteria::like_escape(&criteria::value_as_text(&value)));
				params.push(Value::Text(pattern));
				format!("upper(''||{column}) LIKE upper(?) ESCAPE '{}'", criteria::LIKE_ESCAPE_CHAR)
			},
		}
	}

	fn decode_row(&self, row: &AnyRow) -> DataSourceResult<Record>
	{
		let mut record = Record::new();
		for field in &self.descriptor.fields {
			let value = match field.field_type {
				FieldType::Integer | FieldType::Sequence => {
					row.try_get::<Option<i64>, _>(field.name.as_str()).map_err(DataSourceError::from)?.map(Value::Int)
				},
				FieldType::Float => {
					row.try_get::<Option<f64>, _>(field.name.as_str()).map_err(DataSourceError::from)?.map(Value::Float)
				},
				FieldType::Boolean => {
					row.try_get::<Option<bool>, _>(field.name.as_str()).map_err(DataSourceError::from)?.map(Value::Bool)
				},
				FieldType::Binary => {
					row.try_get::<Option<Vec<u8>>, _>(field.name.as_str()).map_err(DataSourceError::from)?.map(Value::Bytes)
				},
				FieldType::Date | FieldType::DateTime => {
					row.try_get::<Option<String>, _>(field.name.as_str()).map_err(DataSourceError::from)?.map(Value::DateTime)
				},
				FieldType::Text => {
					row.try_get::<Option<String>, _>(field.name.as_str()).map_err(DataSourceError::from)?.map(Value::Text)
				},
			};
			record.insert(field.name.clone(), value.unwrap_or(Value::Null));
		}
		Ok(record)
	}
}

/// Rewrites sequential `?` placeholders for dialects that don't speak them
/// natively (spec §4.3.1: "dialect … only affects placeholder style").
fn rewrite_placeholders(sql: &str, dialect: SqlDialect) -> String
{
	if dialect != SqlDialect::Postgres {
		return sql.to_owned();
	}
	let mut out = String::with_capacity(sql.len() + 8);
	let mut n = 0u32;
	for c in sql.chars() {
		if c == '?' {
			n += 1;
			out.push('$');
			out.push_str(&n.to_string());
		} else {
			out.push(c);
		}
	}
	out
}

type AnyQuery<'q> = sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>;
type AnyScalarQuery<'q, O> = sqlx::query::QueryScalar<'q, sqlx::Any, O, sqlx::any::AnyArguments<'q>>;

fn bind_value(query: AnyQuery<'_>, value: Value) -> AnyQuery<'_>
{
	match value {
		Value::Null => query.bind(None::<String>),
		Value::Bool(b) => query.bind(b),
		Value::Int(i) => query.bind(i),
		Value::Float(f) => query.bind(f),
		Value::Text(s) | Value::DateTime(s) => query.bind(s),
		Value::Bytes(b) => query.bind(b),
		Value::List(_) => query.bind(None::<String>),
	}
}

fn bind_scalar<O>(query: AnyScalarQuery<'_, O>, value: Value) -> AnyScalarQuery<'_, O>
{
	match value {
		Value::Null => query.bind(None::<String>),
		Value::Bool(b) => query.bind(b),
		Value::Int(i) => query.bind(i),
		Value::Float(f) => query.bind(f),
		Value::Text(s) | Value::DateTime(s) => query.bind(s),
		Value::Bytes(b) => query.bind(b),
		Value::List(_) => query.bind(None::<String>),
	}
}
