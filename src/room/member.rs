//! Membership add facts and ban tombstones

use crate::component::VersionedEntry;
use crate::crypto::{self, domain, SignatureBytes};
use crate::error::CodecError;
use crate::types::MemberId;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

/// An invitation: `invited_by` vouches for `id`. Also the key of the add fact,
/// so a member invited by several members holds one fact per inviter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub invited_by: MemberId,
}

/// Member add fact signed by the inviter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedMember {
    pub member: Member,
    pub signature: SignatureBytes,
}

impl AuthorizedMember {
    pub fn new(member: Member, inviter_key: &SigningKey) -> Result<Self, CodecError> {
        let signature = crypto::sign(inviter_key, domain::MEMBER, &member)?;
        Ok(Self { member, signature })
    }

    /// Invite `id`, signed by `inviter_key`.
    pub fn invite(id: MemberId, inviter_key: &SigningKey) -> Result<Self, CodecError> {
        let member = Member {
            id,
            invited_by: crypto::member_id(inviter_key),
        };
        Self::new(member, inviter_key)
    }

    pub fn id(&self) -> MemberId {
        self.member.id
    }

    pub fn invited_by(&self) -> MemberId {
        self.member.invited_by
    }

    pub fn verify(&self) -> bool {
        crypto::verify(
            &self.member.invited_by,
            domain::MEMBER,
            &self.member,
            &self.signature,
        )
    }
}

impl VersionedEntry for AuthorizedMember {
    type Key = Member;

    fn key(&self) -> Member {
        self.member
    }

    fn signature(&self) -> &SignatureBytes {
        &self.signature
    }
}

/// Removal of a member. Tombstones outrank add facts and are never undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    pub banned: MemberId,
    pub reason: String,
}

/// Ban signed by the room owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedBan {
    pub ban: Ban,
    pub signature: SignatureBytes,
}

impl AuthorizedBan {
    pub fn new(ban: Ban, owner_key: &SigningKey) -> Result<Self, CodecError> {
        let signature = crypto::sign(owner_key, domain::BAN, &ban)?;
        Ok(Self { ban, signature })
    }

    pub fn banned(&self) -> MemberId {
        self.ban.banned
    }

    pub fn verify(&self, owner: &MemberId) -> bool {
        crypto::verify(owner, domain::BAN, &self.ban, &self.signature)
    }
}

impl VersionedEntry for AuthorizedBan {
    type Key = MemberId;

    fn key(&self) -> MemberId {
        self.ban.banned
    }

    fn signature(&self) -> &SignatureBytes {
        &self.signature
    }
}
