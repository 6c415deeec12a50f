//! Errors that can occur while assembling the server before it starts serving requests.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// The different errors that can happen in [`crate::server`].
#[derive(Debug, Error)]
pub enum Error
{
	/// The configuration file could not be read.
	#[error("failed to read configuration file at {path:?}: {source}")]
	ConfigIo
	{
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The configuration file could not be parsed.
	#[error("failed to parse configuration file: {0}")]
	ConfigParse(#[from] toml::de::Error),

	/// Something went wrong setting up a named database pool.
	#[error("failed to set up database: {0}")]
	Database(#[from] crate::database::DatabaseError),

	/// The HTTP listener could not be bound.
	#[error("failed to bind HTTP listener on {addr}: {source}")]
	Bind
	{
		addr: SocketAddr,
		#[source]
		source: std::io::Error,
	},
}
