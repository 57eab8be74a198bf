//! Codec
//!
//! Typed interpretation of the opaque buffers at the interface boundary.
//!
//! Every buffer starts with a 4-byte little-endian format version followed by
//! a bincode body. Deltas and summaries are envelopes of
//! `(component id, payload)` pairs so that a component id this build does not
//! know is distinguishable from a payload that does not decode.

use crate::component::{ComponentDelta, ComponentKind, ComponentSummary, EntryTag};
use crate::delta::RoomDelta;
use crate::error::{CodecError, Rejected};
use crate::room::{
    AuthorizedBan, AuthorizedConfiguration, AuthorizedMember, AuthorizedMemberInfo,
    AuthorizedMessage, MemberRegistry, RoomParameters, RoomState,
};
use crate::summary::{KeyedSummary, RoomSummary};
use crate::types::{Parameters, State, StateDelta, StateSummary};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on any decoded structure, guards against hostile length prefixes.
const MAX_DECODE_BYTES: u64 = 64 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_DECODE_BYTES)
        .reject_trailing_bytes()
}

/// Encode with the 4-byte format version prefix.
pub fn encode_versioned<T: Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
    let body = options().serialize(value).map_err(|e| CodecError::Encode {
        what,
        reason: e.to_string(),
    })?;
    let mut bytes = Vec::with_capacity(4 + body.len());
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode a buffer written by `encode_versioned`.
pub fn decode_versioned<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::Malformed {
            what,
            reason: "buffer too short".to_string(),
        });
    }
    let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { what, version });
    }
    options()
        .deserialize(&bytes[4..])
        .map_err(|e| CodecError::Malformed {
            what,
            reason: e.to_string(),
        })
}

fn encode_payload<T: Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
    options().serialize(value).map_err(|e| CodecError::Encode {
        what,
        reason: e.to_string(),
    })
}

fn decode_payload<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
    options().deserialize(bytes).map_err(|e| CodecError::Malformed {
        what,
        reason: e.to_string(),
    })
}

/// Component-tagged envelope used for deltas and summaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Envelope {
    entries: Vec<EnvelopeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnvelopeEntry {
    component: u16,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

pub fn encode_parameters(params: &RoomParameters) -> Result<Parameters, CodecError> {
    encode_versioned("parameters", params).map(Parameters::new)
}

pub fn decode_parameters(params: &Parameters) -> Result<RoomParameters, CodecError> {
    decode_versioned("parameters", params.as_bytes())
}

pub fn encode_state(state: &RoomState) -> Result<State, CodecError> {
    encode_versioned("state", state).map(State::new)
}

pub fn decode_state(state: &State) -> Result<RoomState, CodecError> {
    decode_versioned("state", state.as_bytes())
}

pub fn encode_registry(registry: &MemberRegistry) -> Result<State, CodecError> {
    encode_versioned("member registry", registry).map(State::new)
}

pub fn decode_registry(state: &State) -> Result<MemberRegistry, CodecError> {
    decode_versioned("member registry", state.as_bytes())
}

pub fn encode_summary(summary: &RoomSummary) -> Result<StateSummary, CodecError> {
    let mut envelope = Envelope::default();
    for component in summary.components.values() {
        let payload = match component {
            ComponentSummary::Configuration(tag) => encode_payload("summary", tag)?,
            ComponentSummary::Members(s) => encode_payload("summary", s)?,
            ComponentSummary::Bans(s) => encode_payload("summary", s)?,
            ComponentSummary::MemberInfo(s) => encode_payload("summary", s)?,
            ComponentSummary::Messages(s) => encode_payload("summary", s)?,
        };
        envelope.entries.push(EnvelopeEntry {
            component: component.kind().id(),
            payload,
        });
    }
    encode_versioned("summary", &envelope).map(StateSummary::new)
}

/// Decode a summary leniently.
///
/// An envelope that does not decode is an error. Inside a decodable envelope,
/// unknown component ids are skipped and malformed component payloads are
/// treated as absent, which makes the resulting delta a superset.
pub fn decode_summary(summary: &StateSummary) -> Result<RoomSummary, CodecError> {
    let envelope: Envelope = decode_versioned("summary", summary.as_bytes())?;
    let mut decoded = RoomSummary::default();
    for entry in envelope.entries {
        let Some(kind) = ComponentKind::from_id(entry.component) else {
            debug!(component = entry.component, "Skipping unknown component in summary");
            continue;
        };
        match decode_component_summary(kind, &entry.payload) {
            Ok(component) => {
                decoded.components.insert(kind, component);
            }
            Err(e) => {
                debug!(component = %kind, error = %e, "Treating malformed summary component as absent");
            }
        }
    }
    Ok(decoded)
}

fn decode_component_summary(kind: ComponentKind, payload: &[u8]) -> Result<ComponentSummary, CodecError> {
    let what = "summary component";
    Ok(match kind {
        ComponentKind::Configuration => {
            ComponentSummary::Configuration(decode_payload::<EntryTag>(what, payload)?)
        }
        ComponentKind::Members => {
            ComponentSummary::Members(decode_payload::<KeyedSummary<_>>(what, payload)?)
        }
        ComponentKind::Bans => ComponentSummary::Bans(decode_payload::<KeyedSummary<_>>(what, payload)?),
        ComponentKind::MemberInfo => {
            ComponentSummary::MemberInfo(decode_payload::<KeyedSummary<_>>(what, payload)?)
        }
        ComponentKind::Messages => {
            ComponentSummary::Messages(decode_payload::<KeyedSummary<_>>(what, payload)?)
        }
    })
}

pub fn encode_delta(delta: &RoomDelta) -> Result<StateDelta, CodecError> {
    let mut envelope = Envelope::default();
    for component in delta.components.values() {
        let payload = match component {
            ComponentDelta::Configuration(c) => encode_payload("delta", c)?,
            ComponentDelta::Members(v) => encode_payload("delta", v)?,
            ComponentDelta::Bans(v) => encode_payload("delta", v)?,
            ComponentDelta::MemberInfo(v) => encode_payload("delta", v)?,
            ComponentDelta::Messages(v) => encode_payload("delta", v)?,
        };
        envelope.entries.push(EnvelopeEntry {
            component: component.kind().id(),
            payload,
        });
    }
    encode_versioned("delta", &envelope).map(StateDelta::new)
}

/// Decode a delta strictly: an unknown component id or a malformed payload
/// rejects the whole delta.
pub fn decode_delta(delta: &StateDelta) -> Result<RoomDelta, Rejected> {
    let envelope: Envelope = decode_versioned("delta", delta.as_bytes())?;
    let mut decoded = RoomDelta::new();
    for entry in envelope.entries {
        let kind = ComponentKind::from_id(entry.component)
            .ok_or(Rejected::UnknownComponent(entry.component))?;
        decoded.push(decode_component_delta(kind, &entry.payload)?);
    }
    Ok(decoded)
}

fn decode_component_delta(kind: ComponentKind, payload: &[u8]) -> Result<ComponentDelta, CodecError> {
    let what = "delta component";
    Ok(match kind {
        ComponentKind::Configuration => {
            ComponentDelta::Configuration(decode_payload::<AuthorizedConfiguration>(what, payload)?)
        }
        ComponentKind::Members => {
            ComponentDelta::Members(decode_payload::<Vec<AuthorizedMember>>(what, payload)?)
        }
        ComponentKind::Bans => ComponentDelta::Bans(decode_payload::<Vec<AuthorizedBan>>(what, payload)?),
        ComponentKind::MemberInfo => {
            ComponentDelta::MemberInfo(decode_payload::<Vec<AuthorizedMemberInfo>>(what, payload)?)
        }
        ComponentKind::Messages => {
            ComponentDelta::Messages(decode_payload::<Vec<AuthorizedMessage>>(what, payload)?)
        }
    })
}

/// Build a raw delta buffer from `(component id, payload)` pairs. Used by
/// hosts that forward deltas from newer peers.
pub fn encode_raw_delta(entries: Vec<(u16, Vec<u8>)>) -> Result<StateDelta, CodecError> {
    let envelope = Envelope {
        entries: entries
            .into_iter()
            .map(|(component, payload)| EnvelopeEntry { component, payload })
            .collect(),
    };
    encode_versioned("delta", &envelope).map(StateDelta::new)
}
