use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

#[derive(Args, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
	/// The default log level; RUST_LOG directives take precedence. [default: info]
	#[arg(id = "log-level", long = "log-level")]
	pub level: Option<String>,

	/// Emit structured JSON logs instead of human-readable text.
	#[arg(id = "log-json", long = "log-json", num_args = 0..=1, default_missing_value = "true")]
	pub json: Option<bool>,
}

impl Log {
	pub fn level(&self) -> anyhow::Result<LevelFilter> {
		let level = self.level.as_deref().unwrap_or("info");
		level
			.parse()
			.map_err(|err| anyhow::anyhow!("invalid log level {level:?}: {err}"))
	}

	pub fn json(&self) -> bool {
		self.json.unwrap_or(false)
	}

	pub fn init(&self) -> anyhow::Result<()> {
		use tracing_subscriber::EnvFilter;

		let filter = EnvFilter::builder()
			.with_default_directive(self.level()?.into())
			.from_env_lossy()
			.add_directive("tokio=info".parse()?)
			.add_directive("runtime=info".parse()?);

		let builder = tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter);

		let res = if self.json() {
			builder.json().try_init()
		} else {
			builder.try_init()
		};

		res.map_err(|err| anyhow::anyhow!("failed to initialize logging: {err}"))
	}
}
