use std::time::Duration;

use clap::Parser;

/// Process configuration, read once at start from flags, the environment
/// and an optional `.env` file.
#[derive(Debug, Clone, Parser)]
#[command(name = "bloodbank", version, about = "Blood and organ bank inventory service")]
pub struct Config {
	/// Postgres connection string
	#[arg(long, env = "DATABASE_URL", required_unless_present = "in_memory")]
	pub database_url: Option<String>,

	#[arg(long, env = "BLOODBANK_BIND", default_value = "0.0.0.0:8080")]
	pub bind: String,

	#[arg(long, env = "BLOODBANK_MAX_CONNECTIONS", default_value_t = 5)]
	pub max_connections: u32,

	/// Seconds to wait for a pooled connection before answering 500
	#[arg(long, env = "BLOODBANK_ACQUIRE_TIMEOUT", default_value_t = 3)]
	pub acquire_timeout: u64,

	/// Allowed CORS origins, comma separated; any origin when empty
	#[arg(long = "cors-origin", env = "BLOODBANK_CORS_ORIGINS", value_delimiter = ',')]
	pub cors_origins: Vec<String>,

	/// tracing filter directive, e.g. `info,bloodbank=debug`
	#[arg(long, env = "BLOODBANK_LOG", default_value = "info")]
	pub log: String,

	/// Serve from an in-process store instead of Postgres
	#[arg(long)]
	pub in_memory: bool,
}

impl Config {
	pub fn acquire_timeout(&self) -> Duration {
		Duration::from_secs(self.acquire_timeout)
	}
}
