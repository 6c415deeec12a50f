mod cli;
mod panic_hook;
mod signal;

use color_eyre::eyre::{self, WrapErr};
use dsbroker::runtime::{Config, ServerContext};
use dsbroker::{http, logging, setup};

fn main() -> eyre::Result<()>
{
	color_eyre::install()?;

	let cli::Args::Serve { config_path, listen_addr, port } = cli::args();

	let mut config = Config::load_from_file(config_path)?;
	if let Some(listen_addr) = listen_addr {
		config.server.listen_addr = listen_addr;
	}
	if let Some(port) = port {
		config.server.port = port;
	}

	logging::init(&config.logging);
	self::panic_hook::install();

	dsbroker::runtime::build().wrap_err("failed to build Tokio runtime")?.block_on(run(config))
}

async fn run(config: Config) -> eyre::Result<()>
{
	let addr = config.server.socket_addr();
	let ctx = ServerContext::new(config);
	let router = http::router(ctx);

	let listener = tokio::net::TcpListener::bind(addr).await.map_err(|source| setup::Error::Bind { addr, source })?;

	tracing::info!(%addr, "listening");

	axum::serve(listener, router).with_graceful_shutdown(self::signal::shutdown()).await.wrap_err("server error")
}
