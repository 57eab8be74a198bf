//! Room configuration record (single value with version)

use crate::component::VersionedEntry;
use crate::crypto::{self, domain, SignatureBytes};
use crate::error::CodecError;
use crate::types::MemberId;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfiguration {
    pub version: u64,
    pub name: String,
    pub description: String,
}

impl RoomConfiguration {
    pub fn new(version: u64, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            description: String::new(),
        }
    }

    /// Next revision of this configuration with a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            version: self.version + 1,
            name: name.into(),
            description: self.description.clone(),
        }
    }
}

/// Configuration signed by the room owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedConfiguration {
    pub configuration: RoomConfiguration,
    pub signature: SignatureBytes,
}

impl AuthorizedConfiguration {
    pub fn new(configuration: RoomConfiguration, owner_key: &SigningKey) -> Result<Self, CodecError> {
        let signature = crypto::sign(owner_key, domain::CONFIGURATION, &configuration)?;
        Ok(Self {
            configuration,
            signature,
        })
    }

    pub fn verify(&self, owner: &MemberId) -> bool {
        crypto::verify(owner, domain::CONFIGURATION, &self.configuration, &self.signature)
    }
}

impl VersionedEntry for AuthorizedConfiguration {
    type Key = ();

    fn key(&self) {}

    fn version(&self) -> u64 {
        self.configuration.version
    }

    fn signature(&self) -> &SignatureBytes {
        &self.signature
    }
}
