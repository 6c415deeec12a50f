//! DataSource descriptors, instances, and the process-wide instance pool
//! (spec §4.2, §4.3).

pub mod descriptor;
pub use descriptor::{DataSourceDescriptor, FieldDescriptor, FieldType, ServerType};

mod error;
pub use error::{DataSourceError, DataSourceResult};

pub mod generic;
pub use generic::GenericDataSource;

pub mod sql;
pub use sql::SqlDataSource;

pub mod json_file;
pub use json_file::JsonFileDataSource;

use std::collections::HashMap;
use std::sync::Arc;

use dsbroker_wire::{DsOperationSpec, Value};
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tracing::instrument;

use crate::database::ConnectionPool;
use crate::runtime::DataSourceConfig;

/// One row as consumed by the wire layer: a field name -> scalar value map
/// (spec §3 `Record`).
pub type Record = HashMap<String, Value>;

/// What a successful `executeX` produced (spec §4.3's `execute*` result
/// column), carried up through [`crate::operation::ds::DsOperationRunner`]
/// into a [`dsbroker_wire::Response`].
#[derive(Debug, Clone)]
pub enum ExecuteOutcome
{
	/// `executeFetch`'s windowed result set.
	Fetch
	{
		rows: Vec<Record>, start_row: u64, end_row: u64, total_rows: u64
	},
	/// `executeAdd`/`executeUpdate`/`executeRemove`'s single refreshed row or
	/// PK tuple.
	Row(Record),
}

/// The concrete `DataSource` subclass a descriptor resolves to (spec §4.2:
/// `serverConstructor` or `serverType`). A closed enum rather than
/// `dyn DataSource`, per Design Notes §9 — the kind is always known the
/// moment the descriptor is parsed, so dynamic dispatch buys nothing.
#[derive(Debug)]
pub enum DataSourceInstance
{
	Generic(GenericDataSource),
	Sql(SqlDataSource),
	Json(JsonFileDataSource),
}

impl DataSourceInstance
{
	/// `ServerType::Custom` has no loadable class in this runtime (Design
	/// Notes §9: "no reflection / no dynamic file loading"), so it falls
	/// back to the base `DataSource` behaviour, matching spec §4.2's own
	/// `generic` case.
	pub fn new(descriptor: DataSourceDescriptor, data_source_path: &std::path::Path) -> Self
	{
		match descriptor.server_type {
			ServerType::Sql => Self::Sql(SqlDataSource::new(descriptor)),
			ServerType::Json => Self::Json(JsonFileDataSource::new(descriptor, data_source_path)),
			ServerType::Generic | ServerType::Custom(_) => Self::Generic(GenericDataSource::new(descriptor)),
		}
	}

	pub fn descriptor(&self) -> &DataSourceDescriptor
	{
		match self {
			Self::Generic(ds) => ds.descriptor(),
			Self::Sql(ds) => ds.descriptor(),
			Self::Json(ds) => ds.descriptor(),
		}
	}

	/// "binds the request, acquires back-end resources" (spec §4.3 `init`).
	/// Generic and JSON data sources hold no pooled back-end resource.
	pub async fn init(&mut self, connection_pool: &ConnectionPool) -> DataSourceResult<()>
	{
		match self {
			Self::Sql(ds) => ds.init(connection_pool).await,
			Self::Json(ds) => ds.init().await,
			Self::Generic(_) => Ok(()),
		}
	}

	pub async fn start_transaction(&mut self) -> DataSourceResult<()>
	{
		match self {
			Self::Sql(ds) => ds.start_transaction().await,
			Self::Json(ds) => ds.start_transaction().await,
			Self::Generic(_) => Ok(()),
		}
	}

	pub async fn commit(&mut self) -> DataSourceResult<()>
	{
		match self {
			Self::Sql(ds) => ds.commit().await,
			Self::Json(ds) => ds.commit().await,
			Self::Generic(_) => Ok(()),
		}
	}

	pub async fn rollback(&mut self) -> DataSourceResult<()>
	{
		match self {
			Self::Sql(ds) => ds.rollback().await,
			Self::Json(ds) => ds.rollback().await,
			Self::Generic(_) => Ok(()),
		}
	}

	/// "returns the connection to the pool; never throws to the caller;
	/// failures are logged" (spec §4.3).
	pub async fn free_resources(&mut self, connection_pool: &ConnectionPool)
	{
		match self {
			Self::Sql(ds) => ds.free_resources(connection_pool).await,
			Self::Json(ds) => ds.free_resources().await,
			Self::Generic(_) => {},
		}
	}

	pub async fn execute_fetch(&mut self, op: &DsOperationSpec, strict_sql_filtering: bool) -> DataSourceResult<ExecuteOutcome>
	{
		match self {
			Self::Generic(ds) => ds.execute_fetch(op, strict_sql_filtering).await,
			Self::Sql(ds) => ds.execute_fetch(op, strict_sql_filtering).await,
			Self::Json(ds) => ds.execute_fetch(op).await,
		}
	}

	pub async fn execute_add(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		match self {
			Self::Generic(ds) => ds.execute_add(op).await,
			Self::Sql(ds) => ds.execute_add(op).await,
			Self::Json(ds) => ds.execute_add(op).await,
		}
	}

	pub async fn execute_update(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		match self {
			Self::Generic(ds) => ds.execute_update(op).await,
			Self::Sql(ds) => ds.execute_update(op).await,
			Self::Json(ds) => ds.execute_update(op).await,
		}
	}

	pub async fn execute_remove(&mut self, op: &DsOperationSpec) -> DataSourceResult<ExecuteOutcome>
	{
		match self {
			Self::Generic(ds) => ds.execute_remove(op).await,
			Self::Sql(ds) => ds.execute_remove(op).await,
			Self::Json(ds) => ds.execute_remove(op).await,
		}
	}
}

/// A pool of already-initialised instances for one descriptor id (spec
/// §4.2: "subsequent `acquire` calls reuse a pooled instance").
struct DataSourceSlot
{
	descriptor: Arc<DataSourceDescriptor>,
	idle: Mutex<Vec<DataSourceInstance>>,
	semaphore: Arc<Semaphore>,
}

/// An acquired instance; hold it for one operation's lifetime and return it
/// via [`DataSourcePool::release`].
pub struct PooledDataSource
{
	slot: Arc<DataSourceSlot>,
	instance: Option<DataSourceInstance>,
	_permit: tokio::sync::OwnedSemaphorePermit,
}

impl PooledDataSource
{
	pub fn descriptor(&self) -> &DataSourceDescriptor
	{
		&self.slot.descriptor
	}

	pub fn instance(&mut self) -> &mut DataSourceInstance
	{
		self.instance.as_mut().expect("data source was already released")
	}
}

/// The process-wide registry mapping `id -> Pool<DataSource>` (spec §4.2).
///
/// The descriptor cache is write-once per id (spec §5); instance pools are
/// created lazily, atomically on first `acquire` for a given id, mirroring
/// [`ConnectionPool`][crate::database::ConnectionPool]'s own pattern.
pub struct DataSourcePool
{
	config: Arc<DataSourceConfig>,
	connection_pool: Arc<ConnectionPool>,
	slots: Mutex<HashMap<String, Arc<OnceCell<Arc<DataSourceSlot>>>>>,
}

impl DataSourcePool
{
	pub fn new(config: Arc<DataSourceConfig>, connection_pool: Arc<ConnectionPool>) -> Self
	{
		Self { config, connection_pool, slots: Mutex::new(HashMap::new()) }
	}

	/// Reads `<id>.ds.xml`, falling back to `<id>.ds.js`, under
	/// `dataSource.path` (spec §4.2).
	async fn load_descriptor(&self, id: &str) -> DataSourceResult<DataSourceDescriptor>
	{
		let xml_path = self.config.path.join(format!("{id}.ds.xml"));
		match tokio::fs::read(&xml_path).await {
			Ok(bytes) => return DataSourceDescriptor::parse_xml(id, &bytes),
			Err(error) if error.kind() != std::io::ErrorKind::NotFound => return Err(DataSourceError::Io(error)),
			Err(_) => {},
		}

		let json_path = self.config.path.join(format!("{id}.ds.js"));
		match tokio::fs::read(&json_path).await {
			Ok(bytes) => DataSourceDescriptor::parse_json(id, &bytes),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(DataSourceError::DescriptorNotFound(id.to_owned())),
			Err(error) => Err(DataSourceError::Io(error)),
		}
	}

	async fn slot_for(&self, id: &str) -> DataSourceResult<Arc<DataSourceSlot>>
	{
		let cell = {
			let mut slots = self.slots.lock().await;
			Arc::clone(slots.entry(id.to_owned()).or_insert_with(|| Arc::new(OnceCell::new())))
		};

		cell.get_or_try_init(|| async {
			let descriptor = self.load_descriptor(id).await?;
			let max_instances = self.config.pool.max_connections.unwrap_or(10);
			Ok::<_, DataSourceError>(Arc::new(DataSourceSlot {
				descriptor: Arc::new(descriptor),
				idle: Mutex::new(Vec::new()),
				semaphore: Arc::new(Semaphore::new(max_instances as usize)),
			}))
		})
		.await
		.cloned()
	}

	/// Loads (once, cached) and returns the descriptor for `id`, without
	/// acquiring a pooled instance — used by the REST front-end to resolve a
	/// URL's `_rawPk` segment into a primary-key field name before any
	/// back-end resource is touched.
	pub async fn descriptor_for(&self, id: &str) -> DataSourceResult<Arc<DataSourceDescriptor>>
	{
		Ok(Arc::clone(&self.slot_for(id).await?.descriptor))
	}

	/// Loads (once) and reuses a pooled `DataSource` instance for `id`
	/// (spec §4.2).
	#[instrument(level = "trace", skip(self), err(level = "warn"))]
	pub async fn acquire(&self, id: &str) -> DataSourceResult<PooledDataSource>
	{
		let slot = self.slot_for(id).await?;
		let permit = Arc::clone(&slot.semaphore)
			.acquire_owned()
			.await
			.map_err(|_| DataSourceError::ResourceExhausted(id.to_owned()))?;

		let instance = match slot.idle.lock().await.pop() {
			Some(instance) => instance,
			None => DataSourceInstance::new((*slot.descriptor).clone(), &self.config.path),
		};

		Ok(PooledDataSource { slot, instance: Some(instance), _permit: permit })
	}

	/// Calls `DataSource.freeResources`, then returns the instance to its
	/// pool (spec §4.2).
	pub async fn release(&self, mut pooled: PooledDataSource)
	{
		if let Some(mut instance) = pooled.instance.take() {
			instance.free_resources(&self.connection_pool).await;
			pooled.slot.idle.lock().await.push(instance);
		}
	}

	pub fn connection_pool(&self) -> &Arc<ConnectionPool>
	{
		&self.connection_pool
	}
}
