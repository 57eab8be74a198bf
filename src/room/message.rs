//! Append-only message log entries

use crate::component::VersionedEntry;
use crate::crypto::{self, domain, SignatureBytes};
use crate::error::CodecError;
use crate::types::MemberId;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

/// Composite log key. Field order defines the total order of the log:
/// logical time, then author, then the author's local sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId {
    pub time: u64,
    pub author: MemberId,
    pub seq: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
}

/// Message signed by its author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedMessage {
    pub message: Message,
    pub signature: SignatureBytes,
}

impl AuthorizedMessage {
    pub fn new(message: Message, author_key: &SigningKey) -> Result<Self, CodecError> {
        let signature = crypto::sign(author_key, domain::MESSAGE, &message)?;
        Ok(Self { message, signature })
    }

    pub fn id(&self) -> MessageId {
        self.message.id
    }

    pub fn author(&self) -> MemberId {
        self.message.id.author
    }

    pub fn verify(&self) -> bool {
        crypto::verify(
            &self.message.id.author,
            domain::MESSAGE,
            &self.message,
            &self.signature,
        )
    }
}

impl VersionedEntry for AuthorizedMessage {
    type Key = MessageId;

    fn key(&self) -> MessageId {
        self.message.id
    }

    fn signature(&self) -> &SignatureBytes {
        &self.signature
    }
}
