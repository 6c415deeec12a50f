//! Command-line arguments, grounded on `cs2kz-api`'s `cli.rs`.

use std::net::IpAddr;
use std::path::PathBuf;

pub fn args() -> Args
{
	<Args as clap::Parser>::parse()
}

#[derive(Debug, clap::Parser)]
#[command(name = "dsbroker", about = "DataSource/RPC transaction broker")]
pub enum Args
{
	/// Run the HTTP server.
	Serve
	{
		/// Path to the broker's TOML configuration file.
		#[arg(long = "config", env = "DSBROKER_CONFIG", default_value = "/etc/dsbroker.toml")]
		config_path: PathBuf,

		/// Overrides `server.listen-addr`.
		#[arg(long = "ip")]
		listen_addr: Option<IpAddr>,

		/// Overrides `server.port`.
		#[arg(long)]
		port: Option<u16>,
	},
}
