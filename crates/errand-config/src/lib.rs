//! Configuration for the errand order system.
//!
//! Configuration is loaded from TOML. String values may reference environment
//! variables as `${VAR}` or `${VAR:-default}`, and a file may pull in other
//! files with `include = ["storage.toml"]` as long as every top-level section
//! is defined exactly once across all files.

mod loader;

use chrono::{FixedOffset, Offset, Utc};
use errand_types::{ServiceType, MAX_WINDOW_SECONDS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message, not the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	#[serde(default)]
	pub service: ServiceConfig,
	pub storage: StorageConfig,
	#[serde(default)]
	pub lifecycle: LifecycleConfig,
	#[serde(default)]
	pub scheduler: SchedulerConfig,
}

/// Settings of the running service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Offset from UTC, in minutes, used to turn timestamps into day strings
	/// when filtering by creation date. Defaults to UTC+8.
	#[serde(default = "default_utc_offset_minutes")]
	pub utc_offset_minutes: i32,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			utc_offset_minutes: default_utc_offset_minutes(),
		}
	}
}

fn default_utc_offset_minutes() -> i32 {
	8 * 60
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

impl StorageConfig {
	/// Configuration table of the primary implementation.
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}
}

/// Countdown windows of the order lifecycle, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
	/// Window a new order has to be grabbed before it expires.
	#[serde(default = "default_acceptance_window")]
	pub acceptance_window_seconds: u64,
	/// Window set when an order is grabbed.
	#[serde(default = "PhaseWindows::grab_defaults")]
	pub grab_windows: PhaseWindows,
	/// Window set when work on an order starts.
	#[serde(default = "PhaseWindows::progress_defaults")]
	pub progress_windows: PhaseWindows,
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			acceptance_window_seconds: default_acceptance_window(),
			grab_windows: PhaseWindows::grab_defaults(),
			progress_windows: PhaseWindows::progress_defaults(),
		}
	}
}

fn default_acceptance_window() -> u64 {
	600
}

/// Per-service window lengths for one lifecycle phase.
///
/// Class-related services run on a different schedule from delivery errands,
/// so they get their own values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PhaseWindows {
	pub default_seconds: u64,
	pub course_brush_seconds: u64,
	pub substitute_seconds: u64,
}

impl PhaseWindows {
	fn grab_defaults() -> Self {
		Self {
			default_seconds: 1800,
			course_brush_seconds: 86400,
			substitute_seconds: 5400,
		}
	}

	fn progress_defaults() -> Self {
		Self {
			default_seconds: 7200,
			course_brush_seconds: 86400,
			substitute_seconds: 5400,
		}
	}

	/// Window length for the given service type.
	pub fn for_service(&self, service_type: ServiceType) -> u64 {
		match service_type {
			ServiceType::CourseBrush => self.course_brush_seconds,
			ServiceType::Substitute => self.substitute_seconds,
			_ => self.default_seconds,
		}
	}

	fn validate(&self, name: &str) -> Result<(), ConfigError> {
		for seconds in [
			self.default_seconds,
			self.course_brush_seconds,
			self.substitute_seconds,
		] {
			validate_window(&format!("lifecycle.{}", name), seconds)?;
		}
		Ok(())
	}
}

/// Windows must be positive and no longer than an order can carry.
fn validate_window(name: &str, seconds: u64) -> Result<(), ConfigError> {
	if seconds == 0 || seconds > MAX_WINDOW_SECONDS {
		return Err(ConfigError::Validation(format!(
			"{} values must be between 1 and {} seconds",
			name, MAX_WINDOW_SECONDS
		)));
	}
	Ok(())
}

/// Configuration of the countdown scheduler.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
	#[serde(default = "default_tick_interval_ms")]
	pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			tick_interval_ms: default_tick_interval_ms(),
		}
	}
}

fn default_tick_interval_ms() -> u64 {
	1000
}

/// Resolves `${VAR}` and `${VAR:-default}` references in a string.
///
/// Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;
	for cap in re.captures_iter(input) {
		let Some(full_match) = cap.get(0) else {
			continue;
		};
		let var_name = &cap[1];
		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};
		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;

		let mut loader = loader::ConfigLoader::new(base_dir);
		loader.load_config(file_name).await
	}

	/// UTC offset used for day-string filtering.
	pub fn utc_offset(&self) -> FixedOffset {
		FixedOffset::east_opt(self.service.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if self.storage.primary_config().is_none() {
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if self.service.utc_offset_minutes.abs() > 14 * 60 {
			return Err(ConfigError::Validation(
				"service.utc_offset_minutes must be within +/-840".into(),
			));
		}

		validate_window(
			"lifecycle.acceptance_window_seconds",
			self.lifecycle.acceptance_window_seconds,
		)?;
		self.lifecycle.grab_windows.validate("grab_windows")?;
		self.lifecycle
			.progress_windows
			.validate("progress_windows")?;

		if self.scheduler.tick_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"scheduler.tick_interval_ms must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating
/// the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.utc_offset_minutes, 480);
		assert_eq!(config.utc_offset().local_minus_utc(), 8 * 3600);
		assert_eq!(config.lifecycle.acceptance_window_seconds, 600);
		assert_eq!(config.scheduler.tick_interval_ms, 1000);

		let grab = &config.lifecycle.grab_windows;
		assert_eq!(grab.for_service(ServiceType::Express), 1800);
		assert_eq!(grab.for_service(ServiceType::CourseBrush), 86400);
		assert_eq!(grab.for_service(ServiceType::Substitute), 5400);

		let progress = &config.lifecycle.progress_windows;
		assert_eq!(progress.for_service(ServiceType::Takeout), 7200);
		assert_eq!(progress.for_service(ServiceType::CourseBrush), 86400);
		assert_eq!(progress.for_service(ServiceType::Substitute), 5400);
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("ERRAND_TEST_HOST", "localhost");
		std::env::set_var("ERRAND_TEST_PORT", "5432");

		let input = "host = \"${ERRAND_TEST_HOST}:${ERRAND_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("ERRAND_TEST_HOST");
		std::env::remove_var("ERRAND_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${ERRAND_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${ERRAND_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("ERRAND_MISSING_VAR"));
	}

	#[test]
	fn test_storage_path_from_env() {
		std::env::set_var("ERRAND_TEST_STORAGE_DIR", "/var/lib/errand");
		let config: Config = r#"
[storage]
primary = "file"
[storage.implementations.file]
storage_path = "${ERRAND_TEST_STORAGE_DIR}"
"#
		.parse()
		.unwrap();
		let table = config.storage.primary_config().unwrap();
		assert_eq!(table["storage_path"].as_str(), Some("/var/lib/errand"));
		std::env::remove_var("ERRAND_TEST_STORAGE_DIR");
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let err = r#"
[storage]
primary = "file"
[storage.implementations.memory]
"#
		.parse::<Config>()
		.unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file' not found"));
	}

	#[test]
	fn test_zero_windows_rejected() {
		let input = format!(
			"{}\n[lifecycle.grab_windows]\ndefault_seconds = 0\ncourse_brush_seconds = 1\nsubstitute_seconds = 1\n",
			MINIMAL
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("grab_windows"));

		let input = format!("{}\n[scheduler]\ntick_interval_ms = 0\n", MINIMAL);
		assert!(input.parse::<Config>().is_err());
	}

	#[test]
	fn test_oversized_windows_rejected() {
		let input = format!(
			"{}\n[lifecycle]\nacceptance_window_seconds = 10000000000000\n",
			MINIMAL
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("acceptance_window_seconds"));

		let input = format!(
			"{}\n[lifecycle.progress_windows]\ndefault_seconds = 7200\ncourse_brush_seconds = 99999999999\nsubstitute_seconds = 5400\n",
			MINIMAL
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("progress_windows"));
	}
}
