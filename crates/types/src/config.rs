//! Configuration for the snapshot engine and the commit-ordering processor.
//!
//! Plain serde structs with per-field defaults so partial TOML/JSON configs
//! deserialize cleanly. `validate()` enforces the cross-field rules; callers
//! should validate once at startup and treat the structs as immutable after.

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Configuration validation error.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed validation.
    #[snafu(display("Invalid config: {message}"))]
    Validation {
        /// What failed and why.
        message: String,
    },
}

/// Snapshot engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Elements accumulated per batch before it is flushed to the object
    /// file. Larger batches amortize header overhead; smaller batches bound
    /// the memory held while an entity lock is taken.
    #[serde(default = "default_save_batch_size")]
    pub save_batch_size: u32,
}

fn default_save_batch_size() -> u32 {
    3000
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { save_batch_size: default_save_batch_size() }
    }
}

impl SnapshotConfig {
    /// Validates field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `save_batch_size` is 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.save_batch_size == 0 {
            return Err(ConfigError::Validation {
                message: "save_batch_size must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Commit-ordering processor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Capacity of the bounded client request queue. Producers block (up to
    /// `operation_timeout_ms`) when the queue is full.
    #[serde(default = "default_request_queue_capacity")]
    pub request_queue_capacity: usize,

    /// Upper bound on how long a producer waits for queue space before the
    /// push fails with `QueueFull`.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_request_queue_capacity() -> usize {
    20_000
}

fn default_operation_timeout_ms() -> u64 {
    10_000
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            request_queue_capacity: default_request_queue_capacity(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl ProcessorConfig {
    /// Validates field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the queue capacity or the
    /// operation timeout is 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_queue_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "request_queue_capacity must be > 0".to_string(),
            });
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::Validation {
                message: "operation_timeout_ms must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
