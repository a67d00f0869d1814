use std::{
	fmt::{Display, Formatter},
	time::Duration,
};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// The configuration for the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSettings {
	/// The environment the controller is running in. This is set at runtime
	/// based on an environment variable and if the controller is compiled with
	/// debug mode.
	pub environment: RunningEnvironment,
	/// The namespace to watch. All namespaces are watched when this is not set.
	#[serde(default)]
	pub namespace: Option<String>,
	/// How long to wait before reconciling a descriptor again after a
	/// successful pass.
	#[serde(default = "default_requeue_after_secs", alias = "requeueaftersecs")]
	pub requeue_after_secs: u64,
	/// How long to wait before retrying a pass that failed with a retryable
	/// error.
	#[serde(default = "default_error_requeue_secs", alias = "errorrequeuesecs")]
	pub error_requeue_secs: u64,
	/// How many times an update is retried after losing an optimistic
	/// concurrency race.
	#[serde(default = "default_conflict_retries", alias = "conflictretries")]
	pub conflict_retries: u32,
	/// Interval of the periodic trigger that reconciles every descriptor.
	#[serde(default = "default_resync_interval_secs", alias = "resyncintervalsecs")]
	pub resync_interval_secs: u64,
}

/// Resync a converged descriptor once an hour.
fn default_requeue_after_secs() -> u64 {
	3600
}

/// Retry a failed pass after five seconds.
fn default_error_requeue_secs() -> u64 {
	5
}

/// Give up on an update after three lost races.
fn default_conflict_retries() -> u32 {
	3
}

/// Reconcile every descriptor once an hour.
fn default_resync_interval_secs() -> u64 {
	3600
}

impl ControllerSettings {
	/// Get the controller settings from the config files and the environment.
	pub fn parse(name: &str) -> Result<Self, ConfigError> {
		let env = if cfg!(debug_assertions) {
			"dev".to_string()
		} else {
			std::env::var("GENAI_ENV").unwrap_or_else(|_| "prod".into())
		};

		let builder = match env.as_ref() {
			"prod" | "production" => Config::builder().set_default("environment", "production")?,
			"dev" | "development" => Config::builder().set_default("environment", "development")?,
			_ => {
				return Err(ConfigError::Message(format!(
					"unknown running environment `{}`",
					env
				)));
			}
		};

		Self::from_builder(
			builder
				.add_source(File::with_name("config").required(false))
				.add_source(File::with_name(&format!("config.{}", name)).required(false))
				.add_source(Environment::with_prefix("GENAI").separator("_")),
		)
	}

	/// Builds the settings from the given sources.
	fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
		builder.build()?.try_deserialize()
	}

	/// [`Self::requeue_after_secs`] as a [`Duration`].
	pub fn requeue_after(&self) -> Duration {
		Duration::from_secs(self.requeue_after_secs)
	}

	/// [`Self::error_requeue_secs`] as a [`Duration`].
	pub fn error_requeue(&self) -> Duration {
		Duration::from_secs(self.error_requeue_secs)
	}

	/// [`Self::resync_interval_secs`] as a [`Duration`].
	pub fn resync_interval(&self) -> Duration {
		Duration::from_secs(self.resync_interval_secs)
	}
}

/// The environment the controller is running in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunningEnvironment {
	/// The controller is running in development mode
	Development,
	/// The controller is running in production mode
	Production,
}

impl Display for RunningEnvironment {
	fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		write!(
			formatter,
			"{}",
			match self {
				RunningEnvironment::Development => "Development",
				RunningEnvironment::Production => "Production",
			}
		)
	}
}
