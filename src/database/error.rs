use thiserror::Error;

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// An error returned by the [`ConnectionPool`][super::ConnectionPool] or one
/// of its named [`Pool`][super::Pool]s (spec §4.1, §7).
#[derive(Debug, Error)]
pub enum DatabaseError
{
	/// No `[db]` section is configured, and no database name was given.
	#[error("no database configured, and no default database name set")]
	ConfigMissing,

	/// `db.<dbName>` is absent from configuration.
	#[error("no database named `{0}` is configured")]
	UnknownDatabase(String),

	/// `db.<dbName>.factory` names a factory the [`DriverRegistry`][super::DriverRegistry]
	/// does not recognise.
	#[error("unknown driver factory `{0}`")]
	UnknownDriver(String),

	/// The pool could not produce a connection within its policy.
	#[error("connection pool for `{0}` is exhausted")]
	ResourceExhausted(String),

	/// The back-end driver returned an error (connect, query, validate).
	#[error("backend error: {0}")]
	Backend(#[from] sqlx::Error),
}
