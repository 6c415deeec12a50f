use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::database::SqlDialect;

/// The broker's top-level configuration, loaded from a single TOML file.
///
/// Every key in spec §6's "Configuration" list has a typed home here.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config
{
	pub db: DbConfig,
	pub data_source: DataSourceConfig,
	pub rest: RestConfig,
	pub rpc: RpcConfig,
	pub server: ServerConfig,
	pub logging: LoggingConfig,
}

impl Config
{
	/// Reads and parses the configuration file at `path`.
	pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self, crate::setup::Error>
	{
		let path = path.into();
		let raw = std::fs::read_to_string(&path)
			.map_err(|source| crate::setup::Error::ConfigIo { path, source })?;

		Ok(toml::from_str(&raw)?)
	}
}

/// The `[db]` section: named connection pools.
///
/// `#[serde(flatten)]` is incompatible with `deny_unknown_fields`, so this
/// struct (alone, among the config sections) does not deny unknown keys —
/// every key besides `default-database` is a pool name.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DbConfig
{
	pub default_database: Option<String>,
	#[serde(flatten)]
	pub databases: HashMap<String, DatabaseEntry>,
}

/// One `[db.<name>]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DatabaseEntry
{
	/// SQL dialect; also the default factory name (spec §4.1: `db.<dbName>.factory`).
	#[serde(rename = "type")]
	pub db_type: SqlDialect,
	/// Name of the [`ResourceFactory`][crate::database::ResourceFactory] to use.
	#[serde(default)]
	pub factory: Option<String>,
	pub connection: String,
	#[serde(default)]
	pub pool: PoolConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PoolConfig
{
	pub min_connections: Option<u32>,
	pub max_connections: Option<u32>,
}

/// The `[data-source]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DataSourceConfig
{
	pub path: PathBuf,
	pub strict_sql_filtering: bool,
	pub pool: PoolConfig,
}

impl Default for DataSourceConfig
{
	fn default() -> Self
	{
		Self { path: PathBuf::from("data/datasources"), strict_sql_filtering: false, pool: PoolConfig::default() }
	}
}

/// The `[rest]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RestConfig
{
	pub json_prefix: String,
	pub json_suffix: String,
	pub wrap_json_responses: bool,
	pub dynamic_data_format_param_name: String,
}

impl Default for RestConfig
{
	fn default() -> Self
	{
		Self {
			json_prefix: String::new(),
			json_suffix: String::new(),
			wrap_json_responses: false,
			dynamic_data_format_param_name: String::from("isc_dataFormat"),
		}
	}
}

/// The `[rpc]` section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RpcConfig
{
	pub exception: RpcExceptionConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RpcExceptionConfig
{
	pub stacktrace: bool,
}

/// The `[server]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ServerConfig
{
	pub listen_addr: std::net::IpAddr,
	pub port: u16,
	pub router: RouterConfig,
}

impl Default for ServerConfig
{
	fn default() -> Self
	{
		Self { listen_addr: std::net::IpAddr::from([0, 0, 0, 0]), port: 8080, router: RouterConfig::default() }
	}
}

impl ServerConfig
{
	pub fn socket_addr(&self) -> std::net::SocketAddr
	{
		std::net::SocketAddr::new(self.listen_addr, self.port)
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RouterConfig
{
	pub ida_call: RouteConfig,
	pub rest_call: RouteConfig,
	pub data_source_loader: RouteConfig,
}

impl Default for RouterConfig
{
	fn default() -> Self
	{
		Self {
			ida_call: RouteConfig { path: String::from("/isomorphic/IDACall") },
			rest_call: RouteConfig { path: String::from("/isomorphic/RESTCall") },
			data_source_loader: RouteConfig { path: String::from("/isomorphic/DataSourceLoader") },
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RouteConfig
{
	pub path: String,
}

/// The `[logging]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LoggingConfig
{
	pub level: String,
}

impl Default for LoggingConfig
{
	fn default() -> Self
	{
		Self { level: String::from("info") }
	}
}
