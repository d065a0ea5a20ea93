//! Emergency grant API entry point.

// std
use std::sync::Arc;
// crates.io
use clap::Parser;
use color_eyre::Result;
use emergency_grant::{
	config::Config,
	obs,
	server::{self, build_service},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = Config::parse();

	obs::init_logging(config.log_json);
	tracing::info!(
		base_url = %config.base_url,
		verify_tls = config.verify_tls,
		"Starting emergency grant API."
	);

	let service = Arc::new(build_service(&config)?);

	server::serve(config.listen, service, shutdown_signal()).await?;
	tracing::info!("Emergency grant API stopped.");

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::warn!(error = %e, "Failed to listen for Ctrl-C.");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			},
			Err(e) => {
				tracing::warn!(error = %e, "Failed to listen for SIGTERM.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
