//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use hotstuff_consensus::{ConsensusConfig, VariantKind};
use hotstuff_crypto::{keypair_from_hex, public_key_from_hex};
use hotstuff_types::{KeyPair, Member};

use crate::{LogFormat, NodeError};

/// One entry of the fixed validator set, as written in the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    /// `host:port` the member listens on.
    pub address: String,
}

/// Configuration for a HotStuff node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the inbound listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Hex-encoded 32-byte Ed25519 seed.
    #[serde(default)]
    pub private_key: String,

    #[serde(default)]
    pub variant: VariantKind,

    #[serde(default = "default_member_check_interval_ms")]
    pub member_check_interval_ms: u64,

    #[serde(default = "default_consensus_timeout_ms")]
    pub consensus_timeout_ms: u64,

    #[serde(default = "default_consensus_interval_ms")]
    pub consensus_interval_ms: u64,

    /// How often the prober pings every member.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Most items the demo processor packs into one proposal.
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,

    /// How many committed batches the demo processor remembers.
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Validator set. Order drives leader rotation and must be identical on
    /// every member. Kept last so it serializes as trailing `[[members]]`.
    #[serde(default)]
    pub members: Vec<MemberEntry>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> String {
    "127.0.0.1:7400".to_string()
}

fn default_member_check_interval_ms() -> u64 {
    500
}

fn default_consensus_timeout_ms() -> u64 {
    5_000
}

fn default_consensus_interval_ms() -> u64 {
    100
}

fn default_probe_interval_ms() -> u64 {
    1_000
}

fn default_max_batch_items() -> usize {
    64
}

fn default_recent_capacity() -> usize {
    1_024
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Decode the local key pair from `private_key`.
    pub fn keypair(&self) -> Result<KeyPair, NodeError> {
        if self.private_key.is_empty() {
            return Err(NodeError::Config("private_key is not set".into()));
        }
        keypair_from_hex(&self.private_key).map_err(|e| NodeError::Config(format!("private_key: {e}")))
    }

    /// Decode the validator set.
    pub fn member_list(&self) -> Result<Vec<Member>, NodeError> {
        self.members
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let key = public_key_from_hex(&entry.public_key)
                    .map_err(|e| NodeError::Config(format!("members[{i}].public_key: {e}")))?;
                Ok(Member::new(key, entry.address.clone()))
            })
            .collect()
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// Build the consensus configuration. Shape checks beyond decoding are
    /// left to the core.
    pub fn consensus_config(&self) -> Result<ConsensusConfig, NodeError> {
        if self.probe_interval_ms == 0 {
            return Err(NodeError::Config("probe_interval_ms must be positive".into()));
        }
        if self.max_batch_items == 0 {
            return Err(NodeError::Config("max_batch_items must be positive".into()));
        }
        let mut config = ConsensusConfig::new(self.member_list()?, self.variant);
        config.member_check_interval = Duration::from_millis(self.member_check_interval_ms);
        config.consensus_timeout = Duration::from_millis(self.consensus_timeout_ms);
        config.consensus_interval = Duration::from_millis(self.consensus_interval_ms);
        Ok(config)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            private_key: String::new(),
            variant: VariantKind::default(),
            member_check_interval_ms: default_member_check_interval_ms(),
            consensus_timeout_ms: default_consensus_timeout_ms(),
            consensus_interval_ms: default_consensus_interval_ms(),
            probe_interval_ms: default_probe_interval_ms(),
            max_batch_items: default_max_batch_items(),
            recent_capacity: default_recent_capacity(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            members: Vec::new(),
        }
    }
}
