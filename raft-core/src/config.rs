use config::{Config, ConfigError, File};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::raft::NodeId;

/// Static per-node configuration (§6). Loadable from a layered `config`
/// source (file + environment) the way the teacher's own dependency on the
/// `config` crate implies, or built directly for tests/embedding.
#[derive(Derivative, Serialize, Deserialize, Clone)]
#[derivative(Debug)]
pub struct RaftConfig {
    pub self_id: NodeId,
    /// All participating nodes, including self (§6).
    pub peers: Vec<NodeId>,
    /// Inclusive min/max in ms; each election resets the timer to a value
    /// sampled uniformly from this range (§5, §6, §9).
    pub election_timeout_min_ms: u64,
    pub election_timeout_max_ms: u64,
    /// Ms between leader heartbeats; must be much smaller than the min
    /// election timeout (§6).
    pub heartbeat_interval_ms: u64,
}

impl Default for RaftConfig {
    fn default() -> Self {
        RaftConfig {
            self_id: 0,
            peers: Vec::new(),
            election_timeout_min_ms: 150,
            election_timeout_max_ms: 300,
            heartbeat_interval_ms: 50,
        }
    }
}

impl RaftConfig {
    pub fn other_peers(&self) -> Vec<NodeId> {
        self.peers.iter().copied().filter(|&p| p != self.self_id).collect()
    }

    /// Load configuration layered from a TOML file and `RAFT_*` environment
    /// overrides, matching the teacher's own `config` crate dependency.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::default();
        builder.merge(File::with_name(path))?;
        builder.merge(config::Environment::with_prefix("RAFT"))?;
        builder.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_peers_excludes_self() {
        let config = RaftConfig {
            self_id: 1,
            peers: vec![1, 2, 3],
            ..Default::default()
        };
        assert_eq!(config.other_peers(), vec![2, 3]);
    }
}
