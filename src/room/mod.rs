//! Room contract data model
//!
//! A room is the contract definition this crate ships: a configuration record,
//! membership add facts, ban tombstones, member profiles and a message log.
//! Each field is one independently mergeable component.

pub mod configuration;
pub mod member;
pub mod member_info;
pub mod message;
pub mod parameters;

pub use configuration::{AuthorizedConfiguration, RoomConfiguration};
pub use member::{AuthorizedBan, AuthorizedMember, Ban, Member};
pub use member_info::{AuthorizedMemberInfo, MemberInfo};
pub use message::{AuthorizedMessage, Message, MessageId};
pub use parameters::RoomParameters;

use crate::crypto;
use crate::error::CodecError;
use crate::types::MemberId;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Full room state. The default value is the merge identity.
///
/// Add facts are keyed by `(member, inviter)` and only ever accumulate; who is
/// in the room is derived from them together with the ban tombstones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomState {
    pub configuration: Option<AuthorizedConfiguration>,
    pub members: BTreeMap<Member, AuthorizedMember>,
    pub bans: BTreeMap<MemberId, AuthorizedBan>,
    pub member_info: BTreeMap<MemberId, AuthorizedMemberInfo>,
    pub messages: BTreeMap<MessageId, AuthorizedMessage>,
}

impl RoomState {
    /// Initial state at publication: a version 1 configuration signed by the owner.
    pub fn initial(owner_key: &SigningKey, name: impl Into<String>) -> Result<Self, CodecError> {
        let configuration = AuthorizedConfiguration::new(RoomConfiguration::new(1, name), owner_key)?;
        Ok(Self {
            configuration: Some(configuration),
            ..Self::default()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.configuration.is_none()
            && self.members.is_empty()
            && self.bans.is_empty()
            && self.member_info.is_empty()
            && self.messages.is_empty()
    }

    pub fn is_banned(&self, id: &MemberId) -> bool {
        self.bans.contains_key(id)
    }

    /// Record an add fact under its `(member, inviter)` key.
    pub fn add_member(&mut self, fact: AuthorizedMember) {
        self.members.insert(fact.member, fact);
    }

    /// Add facts naming `id`, one per inviter.
    pub fn invites_of(&self, id: &MemberId) -> impl Iterator<Item = &AuthorizedMember> {
        let first = Member {
            id: *id,
            invited_by: MemberId([0u8; 32]),
        };
        let last = Member {
            id: *id,
            invited_by: MemberId([0xff; 32]),
        };
        self.members.range(first..=last).map(|(_, fact)| fact)
    }

    /// Whether any add fact names `id`, banned or not.
    pub fn has_member(&self, id: &MemberId) -> bool {
        self.invites_of(id).next().is_some()
    }

    /// Every member named by an add fact, banned ones included.
    pub fn member_ids(&self) -> BTreeSet<MemberId> {
        self.members.keys().map(|key| key.id).collect()
    }

    /// Owner, or an added member without a ban tombstone.
    pub fn is_effective_member(&self, params: &RoomParameters, id: &MemberId) -> bool {
        *id == params.owner || (self.has_member(id) && !self.is_banned(id))
    }

    /// Members currently in the room, excluding the owner.
    pub fn effective_members(&self) -> BTreeSet<MemberId> {
        self.member_ids()
            .into_iter()
            .filter(|id| !self.is_banned(id))
            .collect()
    }

    /// Lamport time for the next message in this view of the log.
    pub fn next_message_time(&self) -> u64 {
        self.messages
            .keys()
            .next_back()
            .map(|id| id.time + 1)
            .unwrap_or(1)
    }

    /// Compose the next message id for `author`.
    pub fn next_message_id(&self, author: MemberId) -> MessageId {
        let seq = self
            .messages
            .keys()
            .filter(|id| id.author == author)
            .map(|id| id.seq + 1)
            .max()
            .unwrap_or(0);
        MessageId {
            time: self.next_message_time(),
            author,
            seq,
        }
    }

    /// Sign a new message from `author_key` positioned after everything in this view.
    pub fn compose_message(
        &self,
        author_key: &SigningKey,
        content: impl Into<String>,
    ) -> Result<AuthorizedMessage, CodecError> {
        let id = self.next_message_id(crypto::member_id(author_key));
        AuthorizedMessage::new(
            Message {
                id,
                content: content.into(),
            },
            author_key,
        )
    }

    pub fn nickname(&self, id: &MemberId) -> Option<&str> {
        self.member_info.get(id).map(|i| i.info.nickname.as_str())
    }
}

/// State of a member registry contract: the keys allowed to join rooms that
/// reference it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemberRegistry {
    pub allowed: BTreeSet<MemberId>,
}

impl MemberRegistry {
    pub fn allows(&self, id: &MemberId) -> bool {
        self.allowed.contains(id)
    }
}
