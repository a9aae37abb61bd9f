//! Validator set membership.

use crate::keys::PublicKey;
use serde::{Deserialize, Serialize};

/// A permissioned validator: its signing identity and where to reach it.
///
/// The member list is fixed for the lifetime of a consensus instance and must
/// be ordered identically on every replica, since leader rotation indexes it.
/// Liveness is not part of the record; it is queried from the network.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub public_key: PublicKey,
    pub address: String,
}

impl Member {
    pub fn new(public_key: PublicKey, address: impl Into<String>) -> Self {
        Self {
            public_key,
            address: address.into(),
        }
    }
}
