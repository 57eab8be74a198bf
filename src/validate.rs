//! Validator
//!
//! Pure checks over `(parameters, state, related states)`. Identical inputs
//! yield identical verdicts on every peer. The per-entry checks here are shared
//! with the merge core, which uses them to filter instead of reject.

use crate::codec;
use crate::component::ComponentKind;
use crate::room::{
    AuthorizedBan, AuthorizedConfiguration, AuthorizedMember, AuthorizedMemberInfo,
    AuthorizedMessage, RoomParameters, RoomState,
};
use crate::types::{ContractInstanceId, MemberId, State};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Why a state or entry failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("{kind} entry has a bad signature")]
    BadSignature { kind: ComponentKind },

    #[error("{kind} entry stored under a key that does not match its content")]
    KeyMismatch { kind: ComponentKind },

    #[error("member {member} was invited by unknown member {inviter}")]
    UnknownInviter { member: MemberId, inviter: MemberId },

    #[error("member {0} invited itself")]
    SelfInvite(MemberId),

    #[error("room owner cannot be added as a member")]
    OwnerAsMember,

    #[error("room owner cannot be banned")]
    OwnerBanned,

    #[error("{kind} author {author} is not a member")]
    AuthorNotMember { kind: ComponentKind, author: MemberId },

    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: u32 },

    #[error("nickname of {size} bytes exceeds limit of {max}")]
    NicknameTooLarge { size: usize, max: u32 },

    #[error("member {0} is not listed in the member registry")]
    NotInRegistry(MemberId),

    #[error("related state is malformed: {0}")]
    MalformedRelated(String),

    #[error("summary cannot be interpreted: {0}")]
    MalformedSummary(String),
}

/// Verdict of a validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(InvalidReason),
    /// Not an error: fetch these instances' states and validate again.
    NeedsRelated(Vec<ContractInstanceId>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// States of related contract instances already fetched by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedStates {
    states: BTreeMap<ContractInstanceId, State>,
}

impl RelatedStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ContractInstanceId, state: State) {
        self.states.insert(id, state);
    }

    pub fn get(&self, id: &ContractInstanceId) -> Option<&State> {
        self.states.get(id)
    }

    pub fn extend(&mut self, other: &RelatedStates) {
        for (id, state) in &other.states {
            self.states.insert(*id, state.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContractInstanceId, &State)> {
        self.states.iter()
    }
}

/// Validate a room state, including checks that need related states.
pub fn validate(params: &RoomParameters, state: &RoomState, related: &RelatedStates) -> Validation {
    if let Err(reason) = validate_local(params, state) {
        return Validation::Invalid(reason);
    }

    let effective = state.effective_members();
    if let Some(registry_id) = params.registry.filter(|_| !effective.is_empty()) {
        let Some(bytes) = related.get(&registry_id) else {
            return Validation::NeedsRelated(vec![registry_id]);
        };
        let registry = match codec::decode_registry(bytes) {
            Ok(r) => r,
            Err(e) => return Validation::Invalid(InvalidReason::MalformedRelated(e.to_string())),
        };
        if let Some(outsider) = effective.into_iter().find(|id| !registry.allows(id)) {
            return Validation::Invalid(InvalidReason::NotInRegistry(outsider));
        }
    }

    Validation::Valid
}

/// Validate everything that can be checked from the state alone.
pub fn validate_local(params: &RoomParameters, state: &RoomState) -> Result<(), InvalidReason> {
    if let Some(cfg) = &state.configuration {
        check_configuration(params, cfg)?;
    }

    for (key, ban) in &state.bans {
        if *key != ban.banned() {
            return Err(InvalidReason::KeyMismatch {
                kind: ComponentKind::Bans,
            });
        }
        check_ban(params, ban)?;
    }

    for (key, member) in &state.members {
        if *key != member.member {
            return Err(InvalidReason::KeyMismatch {
                kind: ComponentKind::Members,
            });
        }
        check_member(params, member)?;
    }
    let (_, unresolved) = resolve_invite_chains(params, state.members.values());
    if let Some(member) = unresolved.first() {
        return Err(InvalidReason::UnknownInviter {
            member: member.id(),
            inviter: member.invited_by(),
        });
    }

    for (key, info) in &state.member_info {
        if *key != info.info.member {
            return Err(InvalidReason::KeyMismatch {
                kind: ComponentKind::MemberInfo,
            });
        }
        check_member_info(params, info)?;
        if !state.is_effective_member(params, &info.info.member) {
            return Err(InvalidReason::AuthorNotMember {
                kind: ComponentKind::MemberInfo,
                author: info.info.member,
            });
        }
    }

    for (key, message) in &state.messages {
        if *key != message.id() {
            return Err(InvalidReason::KeyMismatch {
                kind: ComponentKind::Messages,
            });
        }
        check_message(params, message)?;
        if !state.is_effective_member(params, &message.author()) {
            return Err(InvalidReason::AuthorNotMember {
                kind: ComponentKind::Messages,
                author: message.author(),
            });
        }
    }

    Ok(())
}

pub(crate) fn check_configuration(
    params: &RoomParameters,
    cfg: &AuthorizedConfiguration,
) -> Result<(), InvalidReason> {
    if !cfg.verify(&params.owner) {
        return Err(InvalidReason::BadSignature {
            kind: ComponentKind::Configuration,
        });
    }
    Ok(())
}

pub(crate) fn check_ban(params: &RoomParameters, ban: &AuthorizedBan) -> Result<(), InvalidReason> {
    if ban.banned() == params.owner {
        return Err(InvalidReason::OwnerBanned);
    }
    if !ban.verify(&params.owner) {
        return Err(InvalidReason::BadSignature {
            kind: ComponentKind::Bans,
        });
    }
    Ok(())
}

/// Checks on a single add fact; the invite chain is checked separately.
pub(crate) fn check_member(
    params: &RoomParameters,
    member: &AuthorizedMember,
) -> Result<(), InvalidReason> {
    if member.id() == params.owner {
        return Err(InvalidReason::OwnerAsMember);
    }
    if member.id() == member.invited_by() {
        return Err(InvalidReason::SelfInvite(member.id()));
    }
    if !member.verify() {
        return Err(InvalidReason::BadSignature {
            kind: ComponentKind::Members,
        });
    }
    Ok(())
}

pub(crate) fn check_member_info(
    params: &RoomParameters,
    info: &AuthorizedMemberInfo,
) -> Result<(), InvalidReason> {
    let size = info.info.nickname.len();
    if size > params.max_nickname_bytes as usize {
        return Err(InvalidReason::NicknameTooLarge {
            size,
            max: params.max_nickname_bytes,
        });
    }
    if !info.verify() {
        return Err(InvalidReason::BadSignature {
            kind: ComponentKind::MemberInfo,
        });
    }
    Ok(())
}

pub(crate) fn check_message(
    params: &RoomParameters,
    message: &AuthorizedMessage,
) -> Result<(), InvalidReason> {
    let size = message.message.content.len();
    if size > params.max_message_bytes as usize {
        return Err(InvalidReason::MessageTooLarge {
            size,
            max: params.max_message_bytes,
        });
    }
    if !message.verify() {
        return Err(InvalidReason::BadSignature {
            kind: ComponentKind::Messages,
        });
    }
    Ok(())
}

/// Split add facts into those whose invite chain reaches the owner through
/// other add facts, and those that do not. Returns the ids of members with at
/// least one resolving fact, plus the facts that do not resolve. Banned members
/// still anchor the chains of the members they invited.
pub(crate) fn resolve_invite_chains<'a>(
    params: &RoomParameters,
    members: impl IntoIterator<Item = &'a AuthorizedMember>,
) -> (BTreeSet<MemberId>, Vec<&'a AuthorizedMember>) {
    let mut pending: Vec<&AuthorizedMember> = members.into_iter().collect();
    let mut resolved = BTreeSet::new();
    loop {
        let before = pending.len();
        pending.retain(|m| {
            let inviter = m.invited_by();
            if inviter == params.owner || resolved.contains(&inviter) {
                resolved.insert(m.id());
                false
            } else {
                true
            }
        });
        if pending.len() == before {
            break;
        }
    }
    (resolved, pending)
}
