use sqlx::any::AnyConnection;
use sqlx::Connection as _;

use super::{BoxFuture, DatabaseError, DatabaseResult, ResourceFactory};

/// A [`ResourceFactory`] that connects via `sqlx::any`, so the same factory
/// implementation backs every configured SQL dialect; the connection URL's
/// scheme (`sqlite:`, `postgres:`, `mysql:`) picks the driver.
#[derive(Debug, Clone)]
pub struct AnyConnectionFactory
{
	connection_url: String,
}

impl AnyConnectionFactory
{
	pub fn new(connection_url: impl Into<String>) -> Self
	{
		Self { connection_url: connection_url.into() }
	}
}

impl ResourceFactory for AnyConnectionFactory
{
	fn create(&self) -> BoxFuture<'_, DatabaseResult<AnyConnection>>
	{
		Box::pin(async move { AnyConnection::connect(&self.connection_url).await.map_err(DatabaseError::from) })
	}

	fn destroy(&self, conn: AnyConnection) -> BoxFuture<'static, ()>
	{
		Box::pin(async move {
			if let Err(error) = conn.close().await {
				tracing::warn!(%error, "failed to cleanly close connection");
			}
		})
	}

	fn validate(&self, conn: &mut AnyConnection) -> BoxFuture<'_, DatabaseResult<()>>
	{
		Box::pin(async move {
			conn.ping().await.map_err(DatabaseError::from)?;
			Ok(())
		})
	}
}
