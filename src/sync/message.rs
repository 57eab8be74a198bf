//! Sync protocol messages

use crate::codec;
use crate::error::CodecError;
use crate::sync::session::PeerId;
use crate::types::{StateDelta, StateSummary};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Push: here is my summary, ask me for what you lack.
    Announce { summary: StateSummary },
    /// Pull: here is my summary, send me what I lack.
    RequestDelta { summary: StateSummary },
    Delta { delta: StateDelta },
    UpToDate,
    Unsubscribe,
}

impl SyncMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Announce { .. } => "announce",
            SyncMessage::RequestDelta { .. } => "request_delta",
            SyncMessage::Delta { .. } => "delta",
            SyncMessage::UpToDate => "up_to_date",
            SyncMessage::Unsubscribe => "unsubscribe",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode_versioned("sync message", self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode_versioned("sync message", bytes)
    }
}

/// An encoded message addressed to a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub peer: PeerId,
    pub bytes: Vec<u8>,
}
