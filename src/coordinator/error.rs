use thiserror::Error;

/// A top-level failure that short-circuits the whole batch (spec §4.5, §7:
/// "errors above the operation boundary … become a single top-level error").
#[derive(Debug, Error)]
pub enum CoordinatorError
{
	#[error("failed to initialise operation: {0}")]
	Init(#[from] crate::operation::OperationError),
}
