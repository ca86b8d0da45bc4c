//! # config
//!
//! why: describe how a driver runs its node, loadable from json
//! relations: consumed by driver.rs; translated into raft-core's RaftConfig
//! what: DriverConfig with serde defaults, loading and validation

use std::fs;
use std::path::Path;
use std::time::Duration;

use raft_core::{NodeId, RaftConfig};
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

fn default_election_timeout_ms() -> u64 {
    2000
}

fn default_heartbeat_timeout_ms() -> u64 {
    1000
}

/// driver settings; only `node_id` is required in json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub node_id: NodeId,

    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_ms: u64,

    /// timer cadence, and how often a leader re-sends to every peer
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// bootstrap a fresh node straight into leadership
    #[serde(default)]
    pub is_initial_master: bool,
}

impl DriverConfig {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            election_timeout_ms: default_election_timeout_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            is_initial_master: false,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_timeout_ms == 0 {
            return Err(DriverError::Config("heartbeat_timeout_ms must be non-zero".into()));
        }
        if self.election_timeout_ms <= self.heartbeat_timeout_ms {
            return Err(DriverError::Config(format!(
                "election_timeout_ms ({}) must exceed heartbeat_timeout_ms ({})",
                self.election_timeout_ms, self.heartbeat_timeout_ms
            )));
        }
        Ok(())
    }

    /// timing handed to the consensus core
    pub fn raft_config(&self) -> RaftConfig {
        RaftConfig {
            election_timeout_ms: self.election_timeout_ms,
            request_timeout_ms: self.heartbeat_timeout_ms,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_values() {
        let config = DriverConfig::new(4);
        assert_eq!(config.election_timeout_ms, 2000);
        assert_eq!(config.heartbeat_timeout_ms, 1000);
        assert!(!config.is_initial_master);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn raft_config_uses_heartbeat_as_request_timeout() {
        let config = DriverConfig::new(1).raft_config();
        assert_eq!(config.election_timeout_ms, 2000);
        assert_eq!(config.request_timeout_ms, 1000);
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let mut config = DriverConfig::new(1);
        config.heartbeat_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(DriverError::Config(_))));
    }
}
