//! `DataSourceDescriptor` and `FieldDescriptor` (spec §3), loaded from
//! `<id>.ds.xml` (via `quick-xml`) or `<id>.ds.js` (via `serde_json`) and
//! normalised into the same shape (spec §6).

use serde::Deserialize;

use super::error::{DataSourceError, DataSourceResult};

/// The scalar kind of one field (spec §3; concretised per SPEC_FULL §3 into
/// a closed enum rather than a string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType
{
	Text,
	Integer,
	Float,
	Boolean,
	Date,
	DateTime,
	Binary,
	/// Marks an auto-generated primary key (spec §3: "`sequence` marks
	/// auto-generated PK").
	Sequence,
}

/// One field of a [`DataSourceDescriptor`] (spec §3).
#[derive(Debug, Clone)]
pub struct FieldDescriptor
{
	pub name: String,
	pub native_name: Option<String>,
	pub field_type: FieldType,
	pub primary_key: bool,
}

impl FieldDescriptor
{
	/// The back-end column name: `nativeName` if given, else `name` (spec §4.3.1).
	pub fn sql_column(&self) -> &str
	{
		self.native_name.as_deref().unwrap_or(&self.name)
	}
}

/// Which concrete `DataSource` implementation backs a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerType
{
	Generic,
	Sql,
	Json,
	Custom(String),
}

impl ServerType
{
	fn parse(server_type: Option<&str>, server_constructor: Option<&str>) -> Result<Self, String>
	{
		if let Some(class_path) = server_constructor {
			return Ok(Self::Custom(class_path.to_owned()));
		}
		match server_type.unwrap_or("generic") {
			"generic" => Ok(Self::Generic),
			"sql" => Ok(Self::Sql),
			"json" => Ok(Self::Json),
			other => Err(other.to_owned()),
		}
	}
}

/// Immutable per-data-source metadata (spec §3), cached for process
/// lifetime after its first load (spec §5).
#[derive(Debug, Clone)]
pub struct DataSourceDescriptor
{
	pub id: String,
	pub server_type: ServerType,
	pub fields: Vec<FieldDescriptor>,
	pub table_name: Option<String>,
	pub db_name: Option<String>,
	pub file_name: Option<String>,
	pub json_prefix: Option<String>,
	pub json_suffix: Option<String>,
}

impl DataSourceDescriptor
{
	pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor>
	{
		self.fields.iter().find(|field| field.name == name)
	}

	pub fn pk_fields(&self) -> impl Iterator<Item = &FieldDescriptor>
	{
		self.fields.iter().filter(|field| field.primary_key)
	}

	pub fn non_pk_fields(&self) -> impl Iterator<Item = &FieldDescriptor>
	{
		self.fields.iter().filter(|field| !field.primary_key)
	}

	/// The back-end table: `tableName` attribute if given, else the
	/// descriptor's own `id` (spec §4.3.1: "Resolves `tableName` = descriptor
	/// attribute or `id`").
	pub fn table_name(&self) -> &str
	{
		self.table_name.as_deref().unwrap_or(&self.id)
	}

	fn from_raw(requested_id: &str, raw: RawDescriptor) -> DataSourceResult<Self>
	{
		if raw.id != requested_id {
			return Err(DataSourceError::TypeMismatch { requested: requested_id.to_owned(), found: raw.id });
		}

		let server_type =
			ServerType::parse(raw.server_type.as_deref(), raw.server_constructor.as_deref())
				.map_err(DataSourceError::UnknownServerType)?;

		let fields = raw
			.fields
			.into_iter()
			.map(|f| FieldDescriptor {
				name: f.name,
				native_name: f.native_name,
				field_type: f.field_type,
				primary_key: f.primary_key.unwrap_or(false),
			})
			.collect::<Vec<_>>();

		Ok(Self {
			id: raw.id,
			server_type,
			fields,
			table_name: raw.table_name,
			db_name: raw.db_name,
			file_name: raw.file_name,
			json_prefix: raw.json_prefix,
			json_suffix: raw.json_suffix,
		})
	}

	/// Parses a `<id>.ds.xml` descriptor.
	pub fn parse_xml(requested_id: &str, bytes: &[u8]) -> DataSourceResult<Self>
	{
		let text = std::str::from_utf8(bytes).map_err(|e| DataSourceError::DescriptorParseError {
			id: requested_id.to_owned(),
			reason: e.to_string(),
		})?;

		let raw: RawXmlDescriptor =
			quick_xml::de::from_str(text).map_err(|e| DataSourceError::DescriptorParseError {
				id: requested_id.to_owned(),
				reason: e.to_string(),
			})?;

		Self::from_raw(requested_id, raw.into())
	}

	/// Parses a `<id>.ds.js` descriptor.
	pub fn parse_json(requested_id: &str, bytes: &[u8]) -> DataSourceResult<Self>
	{
		let raw: RawJsonDescriptor =
			serde_json::from_slice(bytes).map_err(|e| DataSourceError::DescriptorParseError {
				id: requested_id.to_owned(),
				reason: e.to_string(),
			})?;

		Self::from_raw(requested_id, raw.into())
	}
}

/// The descriptor shape normalised from either wire format (spec §6:
/// "normalised into the same shape").
struct RawDescriptor
{
	id: String,
	server_type: Option<String>,
	server_constructor: Option<String>,
	table_name: Option<String>,
	db_name: Option<String>,
	file_name: Option<String>,
	json_prefix: Option<String>,
	json_suffix: Option<String>,
	fields: Vec<RawField>,
}

struct RawField
{
	name: String,
	field_type: FieldType,
	primary_key: Option<bool>,
	native_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawXmlDescriptor
{
	#[serde(rename = "@ID")]
	id: String,
	#[serde(rename = "@serverType", default)]
	server_type: Option<String>,
	#[serde(rename = "@serverConstructor", default)]
	server_constructor: Option<String>,
	#[serde(rename = "@tableName", default)]
	table_name: Option<String>,
	#[serde(rename = "@dbName", default)]
	db_name: Option<String>,
	#[serde(rename = "@fileName", default)]
	file_name: Option<String>,
	#[serde(rename = "@jsonPrefix", default)]
	json_prefix: Option<String>,
	#[serde(rename = "@jsonSuffix", default)]
	json_suffix: Option<String>,
	#[serde(default, rename = "fields")]
	fields: RawXmlFields,
}

#[derive(Debug, Default, Deserialize)]
struct RawXmlFields
{
	#[serde(default, rename = "field")]
	field: Vec<RawXmlField>,
}

#[derive(Debug, Deserialize)]
struct RawXmlField
{
	#[serde(rename = "@name")]
	name: String,
	#[serde(rename = "@type")]
	field_type: FieldType,
	#[serde(rename = "@primaryKey", default)]
	primary_key: Option<bool>,
	#[serde(rename = "@nativeName", default)]
	native_name: Option<String>,
}

impl From<RawXmlDescriptor> for RawDescriptor
{
	fn from(raw: RawXmlDescriptor) -> Self
	{
		Self {
			id: raw.id,
			server_type: raw.server_type,
			server_constructor: raw.server_constructor,
			table_name: raw.table_name,
			db_name: raw.db_name,
			file_name: raw.file_name,
			json_prefix: raw.json_prefix,
			json_suffix: raw.json_suffix,
			fields: raw
				.fields
				.field
				.into_iter()
				.map(|f| RawField {
					name: f.name,
					field_type: f.field_type,
					primary_key: f.primary_key,
					native_name: f.native_name,
				})
				.collect(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJsonDescriptor
{
	#[serde(rename = "ID")]
	id: String,
	#[serde(default)]
	server_type: Option<String>,
	#[serde(default)]
	server_constructor: Option<String>,
	#[serde(default)]
	table_name: Option<String>,
	#[serde(default)]
	db_name: Option<String>,
	#[serde(default)]
	file_name: Option<String>,
	#[serde(default)]
	json_prefix: Option<String>,
	#[serde(default)]
	json_suffix: Option<String>,
	#[serde(default)]
	fields: Vec<RawJsonField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJsonField
{
	name: String,
	#[serde(rename = "type")]
	field_type: FieldType,
	#[serde(default)]
	primary_key: Option<bool>,
	#[serde(default)]
	native_name: Option<String>,
}

impl From<RawJsonDescriptor> for RawDescriptor
{
	fn from(raw: RawJsonDescriptor) -> Self
	{
		Self {
			id: raw.id,
			server_type: raw.server_type,
			server_constructor: raw.server_constructor,
			table_name: raw.table_name,
			db_name: raw.db_name,
			file_name: raw.file_name,
			json_prefix: raw.json_prefix,
			json_suffix: raw.json_suffix,
			fields: raw
				.fields
				.into_iter()
				.map(|f| RawField {
					name: f.name,
					field_type: f.field_type,
					primary_key: f.primary_key,
					native_name: f.native_name,
				})
				.collect(),
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn parses_json_descriptor()
	{
		let raw = br#"{
			"ID": "country",
			"serverType": "sql",
			"tableName": "country",
			"fields": [
				{"name": "id", "type": "integer", "primaryKey": true},
				{"name": "name", "type": "text"},
				{"name": "continent", "type": "text"}
			]
		}"#;

		let descriptor = DataSourceDescriptor::parse_json("country", raw).unwrap();
		assert_eq!(descriptor.server_type, ServerType::Sql);
		assert_eq!(descriptor.pk_fields().count(), 1);
		assert_eq!(descriptor.table_name(), "country");
	}

	#[test]
	fn parses_xml_descriptor()
	{
		let raw = br#"<DataSource ID="country" serverType="sql">
			<fields>
				<field name="id" type="integer" primaryKey="true"/>
				<field name="name" type="text"/>
			</fields>
		</DataSource>"#;

		let descriptor = DataSourceDescriptor::parse_xml("country", raw).unwrap();
		assert_eq!(descriptor.fields.len(), 2);
		assert_eq!(descriptor.table_name(), "country");
	}

	#[test]
	fn mismatched_id_is_rejected()
	{
		let raw = br#"{"ID": "other", "fields": []}"#;
		let error = DataSourceDescriptor::parse_json("country", raw).unwrap_err();
		assert!(matches!(error, DataSourceError::TypeMismatch { .. }));
	}
}
