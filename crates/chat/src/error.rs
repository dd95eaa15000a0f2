//! Error types for the session registry.

use std::path::PathBuf;

use tailla_worker::PoolError;
use thiserror::Error;

/// Errors returned by registry operations.
///
/// A missing session is never an error; lookups return `None` and set queries
/// return an empty set.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// The registry was shut down before the operation was submitted.
	#[error("session registry is closed")]
	Closed,

	/// The caller's deadline passed before the operation completed.
	#[error("deadline elapsed waiting for the session registry")]
	DeadlineElapsed,

	/// The caller's cancellation token fired before the operation completed.
	#[error("cancelled while waiting for the session registry")]
	Cancelled,

	/// A registry closure panicked on a worker thread.
	#[error("registry operation panicked: {0}")]
	Panicked(String),

	/// The registry's worker threads could not be started.
	#[error("failed to start registry workers: {0}")]
	Spawn(#[source] std::io::Error),

	/// The registry was constructed from an invalid configuration.
	#[error("invalid registry configuration: {0}")]
	Config(#[from] ConfigError),
}

impl From<PoolError> for RegistryError {
	fn from(err: PoolError) -> Self {
		match err {
			PoolError::Closed => Self::Closed,
			PoolError::DeadlineElapsed => Self::DeadlineElapsed,
			PoolError::Cancelled => Self::Cancelled,
			PoolError::Panicked(message) => Self::Panicked(message),
			PoolError::Spawn(error) => Self::Spawn(error),
		}
	}
}

/// Errors that can occur when loading registry configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or an unknown key.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// `workers` was set to zero.
	#[error("workers must be at least 1")]
	InvalidWorkers,
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_errors_map_onto_registry_errors() {
		assert!(matches!(RegistryError::from(PoolError::Closed), RegistryError::Closed));
		assert!(matches!(RegistryError::from(PoolError::DeadlineElapsed), RegistryError::DeadlineElapsed));
		assert!(matches!(RegistryError::from(PoolError::Cancelled), RegistryError::Cancelled));
		assert!(matches!(
			RegistryError::from(PoolError::Panicked("boom".into())),
			RegistryError::Panicked(msg) if msg == "boom"
		));
	}

	#[test]
	fn closed_error_displays_correctly() {
		assert_eq!(RegistryError::Closed.to_string(), "session registry is closed");
	}

	#[test]
	fn config_error_wraps_into_registry_error() {
		let err = RegistryError::from(ConfigError::InvalidWorkers);
		assert!(matches!(err, RegistryError::Config(ConfigError::InvalidWorkers)));
		assert!(err.to_string().contains("at least 1"));
	}

	#[test]
	fn invalid_workers_displays_correctly() {
		assert!(ConfigError::InvalidWorkers.to_string().contains("at least 1"));
	}
}
