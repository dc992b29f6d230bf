//! Run configuration.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Where the controller lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub address: String,
    pub rack: u16,
    pub slot: u16,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            rack: 0,
            slot: 1,
        }
    }
}

/// Settings for one test run.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use plc_conformance::runner::TestConfig;
///
/// let config = TestConfig::from_json(r#"{ "cycleTimeMs": 20, "stopOnFirstFailure": false }"#).unwrap();
/// assert_eq!(config.cycle_time_ms, 20);
/// assert!(!config.stop_on_first_failure);
/// assert_eq!(config.output_block, 2);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestConfig {
    pub connection: ConnectionConfig,
    /// Data block the input image is written to.
    pub input_block: u16,
    /// Data block the output image is read from.
    pub output_block: u16,
    pub cycle_time_ms: u64,
    pub scaling_factor: f64,
    /// Halt the whole run after the first failed path.
    pub stop_on_first_failure: bool,
    /// Bound of each observer channel.
    pub event_capacity: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            input_block: 1,
            output_block: 2,
            cycle_time_ms: 100,
            scaling_factor: 1.0,
            stop_on_first_failure: true,
            event_capacity: 256,
        }
    }
}

impl TestConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
