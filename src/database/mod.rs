//! Named pools of validated back-end connections (spec §4.1).
//!
//! [`ConnectionPool`] is the process-wide registry mapping `dbName -> Pool`;
//! [`Pool`] is the bounded pool for a single named database, generic over
//! the [`ResourceFactory`] that actually opens connections.

mod error;
pub use error::{DatabaseError, DatabaseResult};

mod factory;
pub use factory::AnyConnectionFactory;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use sqlx::any::AnyConnection;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tracing::instrument;

use crate::runtime::DbConfig;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// SQL dialect, affecting only placeholder style and `LIMIT`/`OFFSET` syntax
/// (spec §4.3.1 additions); also `db.<name>.type` from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect
{
	MySql,
	Postgres,
	Sqlite,
}

impl SqlDialect
{
	/// The name used as the default [`ResourceFactory`] when `db.<name>.factory`
	/// is not given explicitly.
	pub fn default_factory_name(self) -> &'static str
	{
		match self {
			Self::MySql => "mysql",
			Self::Postgres => "postgres",
			Self::Sqlite => "sqlite",
		}
	}
}

/// The `{create, destroy, validate}` capability a [`Pool`] is generic over
/// (spec §4.1; Design Notes "`ResourceFactory` duck typing").
///
/// Hand-written in terms of boxed futures, rather than an `async fn` in the
/// trait, so that `Box<dyn ResourceFactory>` stays usable from the
/// [`DriverRegistry`] — this is the one pool-facing trait the expanded spec
/// calls out as needing to stay object-safe.
pub trait ResourceFactory: Send + Sync
{
	fn create(&self) -> BoxFuture<'_, DatabaseResult<AnyConnection>>;
	fn destroy(&self, conn: AnyConnection) -> BoxFuture<'static, ()>;
	fn validate(&self, conn: &mut AnyConnection) -> BoxFuture<'_, DatabaseResult<()>>;
}

/// Maps a factory name (`"sqlite"`, `"postgres"`, `"mysql"`) to a
/// constructor, populated at process start (Design Notes §9: "replace
/// dynamic class loading with a registry of named factories").
pub struct DriverRegistry
{
	constructors: HashMap<&'static str, fn(String) -> Arc<dyn ResourceFactory>>,
}

impl DriverRegistry
{
	/// The three built-in drivers, all backed by `sqlx::any`.
	pub fn with_builtin_drivers() -> Self
	{
		let mut constructors: HashMap<&'static str, fn(String) -> Arc<dyn ResourceFactory>> = HashMap::new();
		constructors.insert("sqlite", |url| Arc::new(AnyConnectionFactory::new(url)));
		constructors.insert("postgres", |url| Arc::new(AnyConnectionFactory::new(url)));
		constructors.insert("mysql", |url| Arc::new(AnyConnectionFactory::new(url)));
		Self { constructors }
	}

	pub fn resolve(&self, name: &str, connection_url: String) -> DatabaseResult<Arc<dyn ResourceFactory>>
	{
		self.constructors
			.get(name)
			.map(|ctor| ctor(connection_url))
			.ok_or_else(|| DatabaseError::UnknownDriver(name.to_owned()))
	}
}

/// A checked-out connection; hold it for the lifetime of one DataSource
/// operation and return it via [`Pool::release`].
#[derive(Debug)]
pub struct Connection
{
	inner: Option<AnyConnection>,
	_permit: tokio::sync::OwnedSemaphorePermit,
}

impl Connection
{
	pub fn as_raw(&mut self) -> &mut AnyConnection
	{
		self.inner.as_mut().expect("connection was already released")
	}
}

/// A bounded pool of [`Connection`]s for a single named database.
pub struct Pool
{
	db_type: SqlDialect,
	factory: Arc<dyn ResourceFactory>,
	idle: Mutex<Vec<AnyConnection>>,
	semaphore: Arc<Semaphore>,
}

impl Pool
{
	pub fn new(db_type: SqlDialect, factory: Arc<dyn ResourceFactory>, max_connections: u32) -> Self
	{
		Self {
			db_type,
			factory,
			idle: Mutex::new(Vec::new()),
			semaphore: Arc::new(Semaphore::new(max_connections as usize)),
		}
	}

	pub fn db_type(&self) -> SqlDialect
	{
		self.db_type
	}

	/// Acquires a connection, validating a reused one and discarding it on
	/// failed validation (spec §4.1: "Validation is invoked by the pool on
	/// borrow").
	#[instrument(level = "trace", skip(self), err(level = "warn"))]
	pub async fn acquire(&self, name: &str) -> DatabaseResult<Connection>
	{
		let permit = Arc::clone(&self.semaphore)
			.acquire_owned()
			.await
			.map_err(|_| DatabaseError::ResourceExhausted(name.to_owned()))?;

		let candidate = self.idle.lock().await.pop();
		let conn = match candidate {
			Some(mut conn) => match self.factory.validate(&mut conn).await {
				Ok(()) => conn,
				Err(error) => {
					tracing::warn!(%error, "discarding connection that failed validation");
					self.factory.destroy(conn).await;
					self.factory.create().await?
				},
			},
			None => self.factory.create().await?,
		};

		Ok(Connection { inner: Some(conn), _permit: permit })
	}

	/// Returns a connection to the pool; failure to return cleanly is logged,
	/// per spec §4.1 ("failure during release is logged but surfaced as an
	/// error") — the caller still observes the `Err`.
	#[instrument(level = "trace", skip_all)]
	pub async fn release(&self, mut conn: Connection) -> DatabaseResult<()>
	{
		if let Some(raw) = conn.inner.take() {
			self.idle.lock().await.push(raw);
		}
		Ok(())
	}
}

/// The process-wide registry mapping `dbName -> Pool` (spec §4.1).
///
/// Pools are created lazily, atomically on first `acquire` for a given name
/// (spec §5: "guarded against concurrent creation").
pub struct ConnectionPool
{
	config: Arc<DbConfig>,
	drivers: DriverRegistry,
	pools: Mutex<HashMap<String, Arc<OnceCell<Arc<Pool>>>>>,
}

impl ConnectionPool
{
	pub fn new(config: Arc<DbConfig>) -> Self
	{
		Self { config, drivers: DriverRegistry::with_builtin_drivers(), pools: Mutex::new(HashMap::new()) }
	}

	fn resolve_name<'a>(&'a self, db_name: Option<&'a str>) -> DatabaseResult<&'a str>
	{
		db_name
			.or(self.config.default_database.as_deref())
			.ok_or(DatabaseError::ConfigMissing)
	}

	async fn pool_for(&self, db_name: &str) -> DatabaseResult<Arc<Pool>>
	{
		let cell = {
			let mut pools = self.pools.lock().await;
			Arc::clone(pools.entry(db_name.to_owned()).or_insert_with(|| Arc::new(OnceCell::new())))
		};

		cell.get_or_try_init(|| async {
			let entry = self
				.config
				.databases
				.get(db_name)
				.ok_or_else(|| DatabaseError::UnknownDatabase(db_name.to_owned()))?;
			let factory_name = entry.factory.as_deref().unwrap_or_else(|| entry.db_type.default_factory_name());
			let factory = self.drivers.resolve(factory_name, entry.connection.clone())?;
			let max_connections = entry.pool.max_connections.unwrap_or(10);
			Ok::<_, DatabaseError>(Arc::new(Pool::new(entry.db_type, factory, max_connections)))
		})
		.await
		.cloned()
	}

	/// Acquires a connection from the named pool (or the default database).
	#[instrument(level = "trace", skip(self), err(level = "warn"))]
	pub async fn acquire(&self, db_name: Option<&str>) -> DatabaseResult<Connection>
	{
		let name = self.resolve_name(db_name)?;
		self.pool_for(name).await?.acquire(name).await
	}

	/// Returns a connection to its named pool.
	pub async fn release(&self, db_name: Option<&str>, conn: Connection) -> DatabaseResult<()>
	{
		let name = self.resolve_name(db_name)?;
		self.pool_for(name).await?.release(conn).await
	}

	/// The configured SQL dialect for the named (or default) database.
	pub async fn get_db_type(&self, db_name: Option<&str>) -> DatabaseResult<SqlDialect>
	{
		let name = self.resolve_name(db_name)?;
		Ok(self.pool_for(name).await?.db_type())
	}
}
