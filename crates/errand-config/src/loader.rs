//! Multi-file configuration loading.
//!
//! A configuration file may list other files under `include`. Included files
//! are resolved relative to the including file's directory, may not be loaded
//! twice, and may not redefine a top-level section another file already set.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a configuration file together with its includes.
pub struct ConfigLoader {
	base_path: PathBuf,
	loaded_files: HashSet<PathBuf>,
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads `config_path` and everything it includes into one [`Config`].
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let main_path = self.base_path.join(config_path);
		let mut combined = toml::Table::new();
		self.merge_file(&main_path, &mut combined).await?;

		let rendered = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		rendered.parse()
	}

	/// Reads one file into `combined`, then follows its includes.
	async fn merge_file(
		&mut self,
		path: &Path,
		combined: &mut toml::Table,
	) -> Result<(), ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		let mut table: toml::Table = toml::from_str(&resolve_env_vars(&content)?)?;
		let includes = extract_includes(table.remove("include"))?;

		for (section, value) in table {
			if let Some(existing) = self.section_sources.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					section,
					existing.display(),
					canonical.display()
				)));
			}
			self.section_sources.insert(section.clone(), canonical.clone());
			combined.insert(section, value);
		}

		let dir = canonical
			.parent()
			.map(Path::to_path_buf)
			.unwrap_or_else(|| self.base_path.clone());
		for include in includes {
			let include_path = if include.is_absolute() {
				include
			} else {
				dir.join(include)
			};
			Box::pin(self.merge_file(&include_path, combined)).await?;
		}

		Ok(())
	}
}

/// Accepts `include = "a.toml"` or `include = ["a.toml", "b.toml"]`.
fn extract_includes(value: Option<toml::Value>) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
