//! CLI entry point: `rok4 serve <config.yaml>` loads a server configuration,
//! builds the layer registry it describes and answers WMS/WMTS/TMS requests
//! against it.

mod config;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{ErrorLevel, Verbosity};
use config::{Registry, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rok4", version, about = "WMS/WMTS/TMS raster tile pyramid server")]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<ErrorLevel>,
}

#[derive(Subcommand)]
enum Commands {
	/// Serve WMS/WMTS/TMS requests from a YAML server configuration.
	Serve {
		/// Path to the server configuration file.
		config: PathBuf,
	},
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	env_logger::Builder::new().filter_level(cli.verbose.log_level_filter()).format_timestamp(None).init();
	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Serve { config } => serve(&config),
	}
}

fn serve(path: &PathBuf) -> Result<()> {
	let config = ServerConfig::from_path(path)?;
	let listen = config.listen;
	let registry = Arc::new(Registry::build(&config)?);

	let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().context("building tokio runtime")?;
	runtime.block_on(async move {
		let app = server::router(registry);
		let listener = tokio::net::TcpListener::bind(listen).await.with_context(|| format!("binding listen address {listen}"))?;
		log::info!("listening on {listen}");
		axum::serve(listener, app).await.context("running server")
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serve_requires_a_config_path() {
		let err = Cli::try_parse_from(["rok4", "serve"]).unwrap_err();
		assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
	}

	#[test]
	fn parses_serve_with_a_config_path() {
		let cli = Cli::try_parse_from(["rok4", "serve", "server.yaml"]).unwrap();
		match cli.command {
			Commands::Serve { config } => assert_eq!(config, PathBuf::from("server.yaml")),
		}
	}
}
