//! Immutable room parameters

use crate::types::{ContractInstanceId, MemberId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_MESSAGE_BYTES: u32 = 4096;
pub const DEFAULT_MAX_NICKNAME_BYTES: u32 = 64;

/// Fixed at instance creation. Together with the room logic definition these
/// determine the instance identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomParameters {
    /// Signs configuration records and bans
    pub owner: MemberId,
    /// Related member registry that gates who may join
    pub registry: Option<ContractInstanceId>,
    pub max_message_bytes: u32,
    pub max_nickname_bytes: u32,
}

impl RoomParameters {
    pub fn new(owner: MemberId) -> Self {
        Self {
            owner,
            registry: None,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_nickname_bytes: DEFAULT_MAX_NICKNAME_BYTES,
        }
    }

    pub fn with_registry(mut self, registry: ContractInstanceId) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_max_message_bytes(mut self, max: u32) -> Self {
        self.max_message_bytes = max;
        self
    }
}
