use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser};
use serde::{Deserialize, Serialize};

use crate::log::Log;

/// Run a simulated receive session.
///
/// Settings come from the optional TOML file first, then any flags given here.
#[derive(Parser, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[command(version, about)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
	/// A TOML configuration file.
	#[arg(long = "config", env = "RTC_CONSUMER_CONFIG")]
	#[serde(skip)]
	pub file: Option<PathBuf>,

	#[command(flatten)]
	pub log: Log,

	#[command(flatten)]
	pub session: SessionConfig,
}

#[derive(Args, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
	/// The number of audio tracks to consume. [default: 1]
	#[arg(long)]
	pub audio: Option<usize>,

	/// The number of video tracks to consume. [default: 1]
	#[arg(long)]
	pub video: Option<usize>,

	/// How long to run before closing the transport, ex. "30s". [default: 10s]
	#[arg(long, value_parser = humantime::parse_duration)]
	#[serde(with = "humantime_serde")]
	pub duration: Option<Duration>,

	/// How often to print a statistics snapshot for every consumer. [default: 1s]
	#[arg(long, value_parser = humantime::parse_duration)]
	#[serde(with = "humantime_serde")]
	pub stats_interval: Option<Duration>,

	/// How often to flip every consumer between paused and resumed. [default: 3s]
	#[arg(long, value_parser = humantime::parse_duration)]
	#[serde(with = "humantime_serde")]
	pub toggle_interval: Option<Duration>,
}

impl SessionConfig {
	pub fn audio(&self) -> usize {
		self.audio.unwrap_or(1)
	}

	pub fn video(&self) -> usize {
		self.video.unwrap_or(1)
	}

	pub fn duration(&self) -> Duration {
		self.duration.unwrap_or(Duration::from_secs(10))
	}

	pub fn stats_interval(&self) -> Duration {
		self.stats_interval.unwrap_or(Duration::from_secs(1))
	}

	pub fn toggle_interval(&self) -> Duration {
		self.toggle_interval.unwrap_or(Duration::from_secs(3))
	}
}

impl Config {
	/// Parse the command line, load the file it names (if any), then apply the flags on top.
	pub fn load() -> anyhow::Result<Self> {
		Self::parse().layer(std::env::args_os())
	}

	fn layer<I, T>(self, args: I) -> anyhow::Result<Self>
	where
		I: IntoIterator<Item = T>,
		T: Into<OsString> + Clone,
	{
		let config = match &self.file {
			Some(path) => {
				let mut config = Self::from_file(path)?;
				// Only flags that were actually given override the file.
				config.try_update_from(args)?;
				config
			}
			None => self,
		};

		config.validate()?;

		Ok(config)
	}

	pub fn from_file(path: &Path) -> anyhow::Result<Self> {
		let contents =
			std::fs::read_to_string(path).with_context(|| format!("failed to read config: {}", path.display()))?;
		let mut config: Self =
			toml::from_str(&contents).with_context(|| format!("failed to parse config: {}", path.display()))?;
		config.file = Some(path.to_path_buf());

		Ok(config)
	}

	fn validate(&self) -> anyhow::Result<()> {
		anyhow::ensure!(!self.session.stats_interval().is_zero(), "stats_interval must be non-zero");
		anyhow::ensure!(!self.session.toggle_interval().is_zero(), "toggle_interval must be non-zero");
		anyhow::ensure!(
			self.session.audio() + self.session.video() > 0,
			"at least one audio or video track is required"
		);
		self.log.level()?;

		Ok(())
	}
}
