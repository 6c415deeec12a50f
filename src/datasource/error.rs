use thiserror::Error;

pub type DataSourceResult<T> = Result<T, DataSourceError>;

/// Errors raised by [`DataSourcePool`][super::DataSourcePool] or by a
/// [`DataSourceInstance`][super::DataSourceInstance] during its lifecycle
/// (spec §4.2, §4.3, §7).
#[derive(Debug, Error)]
pub enum DataSourceError
{
	/// Neither `<id>.ds.xml` nor `<id>.ds.js` exists under `dataSource.path`.
	#[error("no descriptor found for data source `{0}`")]
	DescriptorNotFound(String),

	/// The descriptor file exists but could not be parsed.
	#[error("failed to parse descriptor for `{id}`: {reason}")]
	DescriptorParseError
	{
		id: String,
		reason: String,
	},

	/// The descriptor's own `ID` does not match the requested id.
	#[error("descriptor id mismatch: requested `{requested}`, found `{found}`")]
	TypeMismatch
	{
		requested: String,
		found: String,
	},

	/// `serverType`/`serverConstructor` names something we don't recognise.
	#[error("unknown server type `{0}`")]
	UnknownServerType(String),

	/// A pool of `DataSource` instances could not produce one within policy.
	#[error("data source pool for `{0}` is exhausted")]
	ResourceExhausted(String),

	/// `init` failed to acquire its backing resources (e.g. a `Connection`).
	#[error("failed to acquire resources for `{0}`: {1}")]
	ResourceAcquisitionFailed(String, #[source] crate::database::DatabaseError),

	/// The back-end transaction could not be opened.
	#[error("failed to begin transaction: {0}")]
	TransactionBeginFailed(#[source] crate::database::DatabaseError),

	/// The chosen `DataSource` subclass did not override the requested
	/// operation type.
	#[error("operation not implemented by this data source")]
	Unimplemented,

	/// A query required a complete primary key but one or more PK fields
	/// were absent.
	#[error("missing primary key field `{0}`")]
	MissingPrimaryKey(String),

	/// An update/remove affected zero rows.
	#[error("row does not exist")]
	RowNotFound,

	/// The driver/query layer failed.
	#[error("backend error: {0}")]
	Backend(#[from] sqlx::Error),

	/// Commit succeeded to apparent success but then failed; a rollback was
	/// attempted (spec: status `-10`).
	#[error("transaction commit failed: {0}")]
	TransactionFailed(#[source] sqlx::Error),

	/// An I/O error reading a descriptor or JSON-file data source.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
