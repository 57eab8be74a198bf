//! Per-member profile records (keyed single values with version)

use crate::component::VersionedEntry;
use crate::crypto::{self, domain, SignatureBytes};
use crate::error::CodecError;
use crate::types::MemberId;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub member: MemberId,
    pub version: u64,
    pub nickname: String,
}

/// Profile signed by the member it describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedMemberInfo {
    pub info: MemberInfo,
    pub signature: SignatureBytes,
}

impl AuthorizedMemberInfo {
    pub fn new(info: MemberInfo, member_key: &SigningKey) -> Result<Self, CodecError> {
        let signature = crypto::sign(member_key, domain::MEMBER_INFO, &info)?;
        Ok(Self { info, signature })
    }

    pub fn nickname(
        member_key: &SigningKey,
        version: u64,
        nickname: impl Into<String>,
    ) -> Result<Self, CodecError> {
        let info = MemberInfo {
            member: crypto::member_id(member_key),
            version,
            nickname: nickname.into(),
        };
        Self::new(info, member_key)
    }

    pub fn verify(&self) -> bool {
        crypto::verify(
            &self.info.member,
            domain::MEMBER_INFO,
            &self.info,
            &self.signature,
        )
    }
}

impl VersionedEntry for AuthorizedMemberInfo {
    type Key = MemberId;

    fn key(&self) -> MemberId {
        self.info.member
    }

    fn version(&self) -> u64 {
        self.info.version
    }

    fn signature(&self) -> &SignatureBytes {
        &self.signature
    }
}
