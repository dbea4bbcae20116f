// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registry configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for a [`Registry`](crate::Registry).
///
/// Missing JSON fields take their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Deliver each violation to the installed sink.
    pub report_violations: bool,
    /// Capture a backtrace for each report. Capture still honours
    /// `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`.
    pub capture_backtraces: bool,
    /// Table size above which structural operations sweep stale records.
    pub sweep_threshold: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            report_violations: true,
            capture_backtraces: true,
            sweep_threshold: 1024,
        }
    }
}

impl RegistryConfig {
    /// Parses a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses a JSON config document from raw bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Renders this config as pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
