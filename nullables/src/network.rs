//! Nullable network: record messages without sending them.

use crate::lock;
use async_trait::async_trait;
use hotstuff_messages::ConsensusMessage;
use hotstuff_network::{Network, NetworkError};
use hotstuff_types::{Member, MessageType, PublicKey};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A test network that records messages instead of sending them.
///
/// Every member starts online. Sends always succeed with no reply unless
/// [`fail_sends`](Self::fail_sends) is switched on.
pub struct NullNetwork {
    members: Vec<Member>,
    /// All messages "sent", in order, with their destination.
    sent_messages: Mutex<Vec<(Member, ConsensusMessage)>>,
    offline: Mutex<HashSet<PublicKey>>,
    fail: AtomicBool,
}

impl NullNetwork {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            members,
            sent_messages: Mutex::new(Vec::new()),
            offline: Mutex::new(HashSet::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_online(&self, key: &PublicKey, online: bool) {
        let mut offline = lock(&self.offline);
        if online {
            offline.remove(key);
        } else {
            offline.insert(*key);
        }
    }

    /// Make every subsequent send return an error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Get all sent messages (for assertions).
    pub fn sent(&self) -> Vec<(Member, ConsensusMessage)> {
        lock(&self.sent_messages).clone()
    }

    /// Sent messages of one type.
    pub fn sent_of_type(&self, msg_type: MessageType) -> Vec<(Member, ConsensusMessage)> {
        lock(&self.sent_messages)
            .iter()
            .filter(|(_, m)| m.msg_type == msg_type)
            .cloned()
            .collect()
    }

    /// Drain the sent log.
    pub fn take_sent(&self) -> Vec<(Member, ConsensusMessage)> {
        std::mem::take(&mut *lock(&self.sent_messages))
    }

    /// Clear all state.
    pub fn reset(&self) {
        lock(&self.sent_messages).clear();
        lock(&self.offline).clear();
        self.fail.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for NullNetwork {
    async fn send_to(
        &self,
        member: &Member,
        msg: ConsensusMessage,
    ) -> Result<Option<ConsensusMessage>, NetworkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NetworkError::ConnectionFailed {
                address: member.address.clone(),
                reason: "null network configured to fail".into(),
            });
        }
        lock(&self.sent_messages).push((member.clone(), msg));
        Ok(None)
    }

    fn linked_nodes(&self) -> Vec<Member> {
        let offline = lock(&self.offline);
        self.members
            .iter()
            .filter(|m| !offline.contains(&m.public_key))
            .cloned()
            .collect()
    }

    fn is_online(&self, member: &Member) -> bool {
        !lock(&self.offline).contains(&member.public_key)
    }
}
