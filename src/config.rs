//! Configuration structures for building networks
//!
//! This module provides the network-level settings that are not part of the
//! layer chain itself: the weight-initialization seed and how much
//! per-sample history the statistics keep.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;

/// Network configuration, parsed from JSON.
///
/// Missing fields fall back to [`NetworkConfig::default`].
///
/// # Example
///
/// ```json
/// {
///   "seed": 1234,
///   "history_capacity": 1000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Seed for the weight-initialization generator.
    pub seed: u64,

    /// Number of recent samples kept in the correctness/cost histories.
    /// `None` keeps every sample.
    pub history_capacity: Option<usize>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            history_capacity: None,
        }
    }
}

/// Loads a network configuration from a JSON file.
///
/// Reads the file at `path` and deserializes its JSON contents into a `NetworkConfig`.
///
/// # Returns
///
/// `Ok(NetworkConfig)` on success, or an error if the file cannot be read, the JSON is
/// invalid, or a value fails validation.
///
/// # Examples
///
/// ```no_run
/// use rust_conv_networks::config::load_config;
///
/// let cfg = load_config("config/network.json").unwrap();
/// println!("seed = {}", cfg.seed);
/// ```
pub fn load_config(path: &str) -> Result<NetworkConfig> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses and validates a network configuration from a JSON string.
pub fn parse_config(contents: &str) -> Result<NetworkConfig> {
    let config: NetworkConfig = serde_json::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks values that deserialize fine but cannot be used.
pub fn validate_config(config: &NetworkConfig) -> Result<()> {
    if config.history_capacity == Some(0) {
        return Err(Error::Config(
            "history_capacity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(r#"{ "seed": 7, "history_capacity": 50 }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.history_capacity, Some(50));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config, NetworkConfig::default());
    }

    #[test]
    fn test_zero_history_capacity_rejected() {
        let err = parse_config(r#"{ "history_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_config("{ seed: }").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
