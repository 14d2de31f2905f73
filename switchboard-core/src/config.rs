//! Registry configuration.
//!
//! The registry has no behavioural knobs; the configuration only sizes its
//! storage up front. It derives `serde` traits so hosts can embed it in their
//! own configuration files, with every field optional.

use serde::{Deserialize, Serialize};

/// Initial capacities for a [`Registry`](crate::signals::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Connection slots allocated up front.
    pub connection_capacity: usize,
    /// Emitter entries allocated up front.
    pub emitter_capacity: usize,
    /// Receiver entries allocated up front.
    pub receiver_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connection_capacity: 64,
            emitter_capacity: 16,
            receiver_capacity: 16,
        }
    }
}

impl RegistryConfig {
    /// A configuration that allocates nothing until the first connection.
    pub fn empty() -> Self {
        Self {
            connection_capacity: 0,
            emitter_capacity: 0,
            receiver_capacity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{ "connection_capacity": 1024 }"#).unwrap();

        assert_eq!(config.connection_capacity, 1024);
        assert_eq!(config.emitter_capacity, RegistryConfig::default().emitter_capacity);
    }

    #[test]
    fn round_trips_through_json() {
        let config = RegistryConfig::empty();
        let json = serde_json::to_string(&config).unwrap();
        let back: RegistryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
