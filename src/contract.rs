//! Opaque contract interface
//!
//! The byte-buffer boundary a host or execution sandbox calls into. Every
//! operation is a pure function of `(Parameters, buffers)`: no clock, no
//! randomness, no environment. The codec performs the typed interpretation.

use crate::codec;
use crate::crypto;
use crate::delta;
use crate::error::ContractError;
use crate::merge;
use crate::room::{MemberRegistry, RoomParameters, RoomState};
use crate::summary;
use crate::types::{ContractInstanceId, Hash, Parameters, State, StateDelta, StateSummary};
use crate::validate::{self, InvalidReason, RelatedStates, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Logic definition identifier of the room contract
pub const ROOM_LOGIC: &[u8] = b"concord.room.v1";

/// Verdict of `validate_state`
pub type ValidateResult = Validation;

/// Code hash paired with the instance it identifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    pub code_hash: Hash,
    pub instance: ContractInstanceId,
}

impl ContractKey {
    pub fn new(code_hash: Hash, parameters: &Parameters) -> Self {
        Self {
            code_hash,
            instance: instance_id(&code_hash, parameters),
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance)
    }
}

/// Instance identity: hash of the logic definition followed by the parameters.
pub fn instance_id(code_hash: &Hash, parameters: &Parameters) -> ContractInstanceId {
    let mut bytes = Vec::with_capacity(code_hash.len() + parameters.len());
    bytes.extend_from_slice(code_hash);
    bytes.extend_from_slice(parameters.as_bytes());
    ContractInstanceId(crypto::compute_hash(&bytes))
}

/// One input to `update_state`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateData {
    State(State),
    Delta(StateDelta),
    RelatedState {
        related_to: ContractInstanceId,
        state: State,
    },
}

/// Result of `update_state`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(State),
    /// Re-invoke with these instances' states appended as `RelatedState`.
    NeedsRelated(Vec<ContractInstanceId>),
}

/// Contract Interface
///
/// Implementations must be deterministic: identical inputs give identical
/// outputs on every peer.
pub trait ContractInterface: Send + Sync {
    /// Hash of the logic definition, the first half of instance identity.
    fn code_hash(&self) -> Hash;

    fn validate_state(
        &self,
        parameters: &Parameters,
        state: &State,
        related: &RelatedStates,
    ) -> Result<ValidateResult, ContractError>;

    fn summarize_state(
        &self,
        parameters: &Parameters,
        state: &State,
    ) -> Result<StateSummary, ContractError>;

    /// Delta the holder of `summary` is missing, `None` when it is up to date.
    fn get_state_delta(
        &self,
        parameters: &Parameters,
        state: &State,
        summary: &StateSummary,
    ) -> Result<Option<StateDelta>, ContractError>;

    fn apply_delta(
        &self,
        parameters: &Parameters,
        state: &State,
        delta: &StateDelta,
    ) -> Result<State, ContractError>;

    fn merge_states(
        &self,
        parameters: &Parameters,
        a: &State,
        b: &State,
    ) -> Result<State, ContractError>;

    fn update_state(
        &self,
        parameters: &Parameters,
        state: &State,
        updates: Vec<UpdateData>,
    ) -> Result<UpdateOutcome, ContractError>;

    fn key(&self, parameters: &Parameters) -> ContractKey {
        ContractKey::new(self.code_hash(), parameters)
    }
}

/// The room contract over opaque buffers
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomContract;

impl RoomContract {
    pub fn new() -> Self {
        Self
    }

    fn decode(
        parameters: &Parameters,
        state: &State,
    ) -> Result<(RoomParameters, RoomState), ContractError> {
        Ok((
            codec::decode_parameters(parameters)?,
            codec::decode_state(state)?,
        ))
    }
}

impl ContractInterface for RoomContract {
    fn code_hash(&self) -> Hash {
        crypto::compute_code_hash(ROOM_LOGIC)
    }

    fn validate_state(
        &self,
        parameters: &Parameters,
        state: &State,
        related: &RelatedStates,
    ) -> Result<ValidateResult, ContractError> {
        let (params, room) = Self::decode(parameters, state)?;
        Ok(validate::validate(&params, &room, related))
    }

    fn summarize_state(
        &self,
        parameters: &Parameters,
        state: &State,
    ) -> Result<StateSummary, ContractError> {
        let (params, room) = Self::decode(parameters, state)?;
        Ok(codec::encode_summary(&summary::summarize(&params, &room))?)
    }

    fn get_state_delta(
        &self,
        parameters: &Parameters,
        state: &State,
        summary: &StateSummary,
    ) -> Result<Option<StateDelta>, ContractError> {
        let (params, room) = Self::decode(parameters, state)?;
        let peer = codec::decode_summary(summary)
            .map_err(|e| ContractError::Invalid(InvalidReason::MalformedSummary(e.to_string())))?;
        match delta::delta_from(&params, &room, &peer) {
            Some(d) => Ok(Some(codec::encode_delta(&d)?)),
            None => Ok(None),
        }
    }

    fn apply_delta(
        &self,
        parameters: &Parameters,
        state: &State,
        delta: &StateDelta,
    ) -> Result<State, ContractError> {
        let (params, room) = Self::decode(parameters, state)?;
        let decoded = codec::decode_delta(delta)?;
        let updated = delta::apply(&params, &room, &decoded)?;
        Ok(codec::encode_state(&updated)?)
    }

    fn merge_states(
        &self,
        parameters: &Parameters,
        a: &State,
        b: &State,
    ) -> Result<State, ContractError> {
        let (params, left) = Self::decode(parameters, a)?;
        let right = codec::decode_state(b)?;
        Ok(codec::encode_state(&merge::merge(&params, &left, &right))?)
    }

    fn update_state(
        &self,
        parameters: &Parameters,
        state: &State,
        updates: Vec<UpdateData>,
    ) -> Result<UpdateOutcome, ContractError> {
        let (params, mut current) = Self::decode(parameters, state)?;
        let mut related = RelatedStates::new();

        for update in updates {
            match update {
                UpdateData::State(incoming) => {
                    let incoming = codec::decode_state(&incoming)?;
                    validate::validate_local(&params, &incoming).map_err(ContractError::Invalid)?;
                    current = merge::merge(&params, &current, &incoming);
                }
                UpdateData::Delta(delta) => {
                    let decoded = codec::decode_delta(&delta)?;
                    current = delta::apply(&params, &current, &decoded)?;
                }
                UpdateData::RelatedState { related_to, state } => {
                    related.insert(related_to, state);
                }
            }
        }

        if let Some(registry) = registry_for(&params, &related)? {
            current = merge::restrict_to_registry(&params, &current, &registry);
        }

        match validate::validate(&params, &current, &related) {
            Validation::Valid => Ok(UpdateOutcome::Updated(codec::encode_state(&current)?)),
            Validation::Invalid(reason) => Err(ContractError::Invalid(reason)),
            Validation::NeedsRelated(ids) => {
                debug!(count = ids.len(), "Update needs related states");
                Ok(UpdateOutcome::NeedsRelated(ids))
            }
        }
    }
}

/// The room's member registry, when the room names one and its state is at hand.
fn registry_for(
    params: &RoomParameters,
    related: &RelatedStates,
) -> Result<Option<MemberRegistry>, ContractError> {
    let Some(bytes) = params.registry.and_then(|id| related.get(&id)) else {
        return Ok(None);
    };
    codec::decode_registry(bytes)
        .map(Some)
        .map_err(|e| ContractError::Invalid(InvalidReason::MalformedRelated(e.to_string())))
}
