//! Main entry point for the stamp estimation service.
//!
//! This binary runs the estimation sidecar a node queries to price a
//! candidate transaction before broadcasting it. It wires the configured
//! storage backend and execution engine into the estimation pipeline and
//! serves it over a local Unix domain socket.

use clap::Parser;
use estimator_config::Config;
use estimator_core::Estimator;
use estimator_execution::EngineFactory;
use estimator_service::server::EstimatorServer;
use estimator_storage::BackendFactory;
use std::collections::HashMap;
use std::path::PathBuf;

/// Command-line arguments for the estimation service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the estimation service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the estimation pipeline from the configured implementations
/// 5. Serves the socket until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt().with_env_filter(env_filter).with_target(true).init();

	tracing::info!("Started stamp estimator");

	// Load configuration
	let config = Config::from_file_async(args.config.to_string_lossy().as_ref()).await?;
	tracing::info!(
		storage = %config.storage.primary,
		engine = %config.execution.primary,
		"Loaded configuration"
	);

	// Build the pipeline and bind the socket
	let estimator = build_estimator(&config)?;
	let server = EstimatorServer::bind(config.service.socket_path.clone(), estimator)?;

	tokio::select! {
		result = server.run() => {
			result?;
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Shutdown signal received");
		}
	}

	server.close()?;
	tracing::info!("Stopped stamp estimator");
	Ok(())
}

/// Builds the estimation pipeline from the configured implementations.
///
/// Storage backends and execution engines are pluggable; each crate
/// exposes its registered implementations as (name, factory) pairs and
/// the configuration selects one of each.
fn build_estimator(config: &Config) -> Result<Estimator, Box<dyn std::error::Error>> {
	let storage_factories: HashMap<String, BackendFactory> =
		estimator_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();
	let backend_factory = storage_factories
		.get(&config.storage.primary)
		.ok_or_else(|| format!("Unknown storage backend '{}'", config.storage.primary))?;
	let backend = backend_factory(&config.primary_storage())?;

	let engine_factories: HashMap<String, EngineFactory> =
		estimator_execution::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();
	let engine_factory = engine_factories
		.get(&config.execution.primary)
		.ok_or_else(|| format!("Unknown execution engine '{}'", config.execution.primary))?;
	let engine = engine_factory(&config.primary_engine())?;

	Ok(Estimator::new(backend, engine))
}
