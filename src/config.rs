//! Machine configuration.
//!
//! A [`MachineConfig`] fixes the shape of one simulated machine: memory
//! size, where execution starts, and which addresses are the I/O ports.
//! It can be read from a JSON file; missing keys take their defaults.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::cpu::memory::{DEFAULT_CAPACITY, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};

/// Default cycle budget for a run.
pub const DEFAULT_MAX_CYCLES: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    /// Number of memory cells.
    pub memory_size: usize,
    /// Initial program counter.
    pub start_address: i32,
    /// Address whose loads read from the input port.
    pub input_port: i32,
    /// Address whose stores write to the output port.
    pub output_port: i32,
    /// Cycle budget used by harnesses that do not set one.
    pub max_cycles: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_CAPACITY,
            start_address: 0,
            input_port: DEFAULT_INPUT_PORT,
            output_port: DEFAULT_OUTPUT_PORT,
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

impl MachineConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Check that the configuration describes a usable machine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 {
            return Err(ConfigError::Invalid("memory_size must be at least 1".into()));
        }
        if self.memory_size > i32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "memory_size {} exceeds the 32-bit address space",
                self.memory_size
            )));
        }
        if self.input_port == self.output_port {
            return Err(ConfigError::Invalid(format!(
                "input and output ports share address {}",
                self.input_port
            )));
        }
        Ok(())
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
