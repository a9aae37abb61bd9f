//! Core configuration and the capability bundle.

use crate::ConsensusError;
use hotstuff_crypto::{Hasher, Signer, SignerGenerator};
use hotstuff_messages::ExternalProcessor;
use hotstuff_network::Network;
use hotstuff_types::{Member, PublicKey, ViewNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Smallest member set that tolerates one Byzantine fault.
pub const MIN_MEMBERS: usize = 4;

/// How far past the current view a NewView or vote may be and still be
/// kept for later.
pub const VIEW_WINDOW: ViewNumber = 64;

/// Largest distance between a proposal's view and its justify's view.
/// Also bounds how many skipped views a chained replica regenerates.
pub const MAX_VIEW_GAP: ViewNumber = 4_096;

/// Which protocol variant a core runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    #[default]
    Basic,
    Chained,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Chained => "chained",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantKind {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "chained" => Ok(Self::Chained),
            other => Err(ConsensusError::Config(format!("unknown variant {other:?}"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Fixed validator set. Order determines leader rotation and must match
    /// on every replica.
    pub members: Vec<Member>,
    /// How often to poll member liveness before the first round.
    pub member_check_interval: Duration,
    /// View-change timeout.
    pub consensus_timeout: Duration,
    /// Pacing delay between a decide and the next round.
    pub consensus_interval: Duration,
    pub variant: VariantKind,
}

impl ConsensusConfig {
    pub fn new(members: Vec<Member>, variant: VariantKind) -> Self {
        Self {
            members,
            member_check_interval: Duration::from_millis(500),
            consensus_timeout: Duration::from_secs(5),
            consensus_interval: Duration::from_millis(100),
            variant,
        }
    }

    /// Check the configuration shape for a replica identified by `self_key`.
    pub fn validate(&self, self_key: &PublicKey) -> Result<(), ConsensusError> {
        if self.members.len() < MIN_MEMBERS {
            return Err(ConsensusError::Config(format!(
                "need at least {MIN_MEMBERS} members, got {}",
                self.members.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.members.len());
        for member in &self.members {
            if !seen.insert(member.public_key) {
                return Err(ConsensusError::Config(format!(
                    "duplicate member {}",
                    member.public_key
                )));
            }
            if member.address.is_empty() {
                return Err(ConsensusError::Config(format!(
                    "member {} has no address",
                    member.public_key
                )));
            }
        }

        if !seen.contains(self_key) {
            return Err(ConsensusError::Config(format!(
                "local key {self_key} is not a member"
            )));
        }
        if self.consensus_timeout.is_zero() {
            return Err(ConsensusError::Config("consensus timeout must be non-zero".into()));
        }
        if self.member_check_interval.is_zero() {
            return Err(ConsensusError::Config(
                "member check interval must be non-zero".into(),
            ));
        }
        if self.consensus_interval >= self.consensus_timeout {
            return Err(ConsensusError::Config(format!(
                "consensus interval {:?} must be shorter than the timeout {:?}",
                self.consensus_interval, self.consensus_timeout
            )));
        }
        Ok(())
    }
}

/// External capabilities the core consumes.
#[derive(Clone)]
pub struct Capabilities {
    pub signer: Arc<dyn Signer>,
    pub signer_generator: Arc<dyn SignerGenerator>,
    pub hasher: Arc<dyn Hasher>,
    pub network: Arc<dyn Network>,
    pub processor: Arc<dyn ExternalProcessor>,
}
