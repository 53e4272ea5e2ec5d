mod config;
mod log;
mod session;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::load()?;
	config.log.init()?;

	tracing::info!(
		audio = config.session.audio(),
		video = config.session.video(),
		stats_interval = ?config.session.stats_interval(),
		"starting simulated session"
	);

	session::run(config.session).await
}
