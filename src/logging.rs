use tracing_subscriber::EnvFilter;

pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn init(directive: &str) -> Result<(), InitError> {
	let filter = EnvFilter::try_new(directive)?;
	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init()
}
