//! Registry configuration.
//!
//! ```toml
//! workers = 8
//! thread-name = "tailla-registry"
//! ```
//!
//! Every key is optional. `workers` defaults to the available hardware
//! parallelism.

use std::path::Path;

use serde::Deserialize;
use tailla_worker::{PoolConfig, default_workers};

use crate::error::ConfigError;

/// Sizing and naming of the registry's worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RegistryConfig {
	/// Worker thread count; `None` uses the available hardware parallelism.
	pub workers: Option<usize>,
	/// Prefix for worker thread names.
	pub thread_name: String,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			workers: None,
			thread_name: "tailla-registry".to_string(),
		}
	}
}

impl RegistryConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	#[must_use]
	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = Some(workers);
		self
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.workers == Some(0) {
			return Err(ConfigError::InvalidWorkers);
		}
		Ok(())
	}

	/// Resolved worker count.
	pub fn worker_count(&self) -> usize {
		self.workers.unwrap_or_else(default_workers)
	}

	pub(crate) fn pool_config(&self) -> PoolConfig {
		PoolConfig::default().with_workers(self.worker_count()).with_thread_name(self.thread_name.clone())
	}
}
