use thiserror::Error;

pub type OperationResult<T> = Result<T, OperationError>;

/// Errors raised while running one operation through its lifecycle
/// (spec §4.5, §7). These are caught by the coordinator and turned into a
/// failure response in that operation's slot — except during `init`, where
/// they abort the whole batch (spec §4.5: "If `init` fails … the coordinator
/// surfaces a single top-level error").
#[derive(Debug, Error)]
pub enum OperationError
{
	#[error(transparent)]
	DataSource(#[from] crate::datasource::DataSourceError),

	#[error(transparent)]
	Database(#[from] crate::database::DatabaseError),
}
