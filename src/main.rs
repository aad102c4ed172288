// blood & organ bank

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use bloodbank::{
	api,
	config::Config,
	logging,
	store::{MemoryStore, PgStore, SharedStore},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
	// a missing .env is fine, the environment may carry everything
	dotenvy::dotenv().ok();
	let config = Config::parse();
	logging::init(&config.log)?;

	let store: SharedStore = if config.in_memory {
		warn!("serving from the in-memory store, nothing will be persisted");
		Arc::new(MemoryStore::with_standard_stock())
	} else {
		let url = config.database_url.as_deref().ok_or("DATABASE_URL not set")?;
		Arc::new(PgStore::connect_lazy(url, config.max_connections, config.acquire_timeout())?)
	};

	let app = api::router(store, api::cors_layer(&config.cors_origins));

	let listener = tokio::net::TcpListener::bind(&config.bind).await?;
	info!(addr = %listener.local_addr()?, "blood bank listening");
	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
	info!("server stopped");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			warn!(error = %err, "cannot listen for ctrl-c");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				warn!(error = %err, "cannot listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
	info!("shutting down");
}
