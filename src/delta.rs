//! Delta engine
//!
//! `delta_from` computes what a peer is missing from its summary; `apply`
//! folds a delta into local state through the merge core and re-validates the
//! result. Applying the same, an overlapping, or an out-of-order delta is safe
//! because every component merge is idempotent.

use crate::component::{ComponentDelta, ComponentKind, EntryTag, VersionedEntry};
use crate::error::Rejected;
use crate::merge;
use crate::room::{
    AuthorizedConfiguration, AuthorizedMember, AuthorizedMemberInfo, AuthorizedMessage,
    RoomParameters, RoomState,
};
use crate::summary::{keyed_digest, KeyedSummary, RoomSummary};
use crate::types::MemberId;
use crate::validate::{self, resolve_invite_chains, InvalidReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A partial update covering one or more components
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomDelta {
    pub components: BTreeMap<ComponentKind, ComponentDelta>,
}

impl RoomDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component delta, combining with any existing delta of the same kind.
    pub fn with(mut self, component: ComponentDelta) -> Self {
        self.push(component);
        self
    }

    pub fn push(&mut self, component: ComponentDelta) {
        let kind = component.kind();
        match (self.components.remove(&kind), component) {
            (Some(ComponentDelta::Members(mut a)), ComponentDelta::Members(b)) => {
                a.extend(b);
                self.components.insert(kind, ComponentDelta::Members(a));
            }
            (Some(ComponentDelta::Bans(mut a)), ComponentDelta::Bans(b)) => {
                a.extend(b);
                self.components.insert(kind, ComponentDelta::Bans(a));
            }
            (Some(ComponentDelta::MemberInfo(mut a)), ComponentDelta::MemberInfo(b)) => {
                a.extend(b);
                self.components.insert(kind, ComponentDelta::MemberInfo(a));
            }
            (Some(ComponentDelta::Messages(mut a)), ComponentDelta::Messages(b)) => {
                a.extend(b);
                self.components.insert(kind, ComponentDelta::Messages(a));
            }
            (Some(ComponentDelta::Configuration(a)), ComponentDelta::Configuration(b)) => {
                let winner = if a.supersedes(&b) { a } else { b };
                self.components
                    .insert(kind, ComponentDelta::Configuration(winner));
            }
            (_, component) => {
                self.components.insert(kind, component);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.values().all(ComponentDelta::is_empty)
    }

    /// Number of entries carried.
    pub fn len(&self) -> usize {
        self.components.values().map(ComponentDelta::len).sum()
    }

    /// The delta as a partial room state.
    pub fn to_patch(&self) -> RoomState {
        let mut patch = RoomState::default();
        for component in self.components.values() {
            component.fold_into(&mut patch);
        }
        patch
    }

    /// Full-state delta: everything in `state`.
    pub fn from_state(state: &RoomState) -> Self {
        delta_from_summary(state, &RoomSummary::default()).unwrap_or_default()
    }
}

/// Compute the delta a peer whose state matches `peer_summary` is missing.
/// Returns `None` when the peer is up to date.
pub fn delta_from(
    _params: &RoomParameters,
    local: &RoomState,
    peer_summary: &RoomSummary,
) -> Option<RoomDelta> {
    delta_from_summary(local, peer_summary)
}

fn delta_from_summary(local: &RoomState, peer_summary: &RoomSummary) -> Option<RoomDelta> {
    let mut delta = RoomDelta::new();
    for kind in ComponentKind::ALL {
        let peer = peer_summary.get(kind).filter(|s| s.kind() == kind);
        if let Some(component) = kind.missing(local, peer) {
            delta.push(component);
        }
    }
    if delta.is_empty() {
        None
    } else {
        Some(delta)
    }
}

/// Whether the local configuration should be sent to a peer holding `peer`.
pub(crate) fn configuration_missing(local: &AuthorizedConfiguration, peer: Option<EntryTag>) -> bool {
    let Some(peer) = peer else {
        return true;
    };
    let local_tag = local.tag();
    local_tag.version > peer.version
        || (local_tag.version == peer.version && local_tag.fingerprint != peer.fingerprint)
}

/// Entries of `local` the peer lacks, or holds in an older or conflicting form.
/// With no usable peer summary the whole component is returned.
pub(crate) fn keyed_missing<E>(
    local: &BTreeMap<E::Key, E>,
    peer: Option<&KeyedSummary<E::Key>>,
) -> Vec<E>
where
    E: VersionedEntry,
    E::Key: Serialize,
{
    let Some(peer) = peer else {
        return local.values().cloned().collect();
    };
    if peer.digest == keyed_digest(local) {
        return Vec::new();
    }
    local
        .iter()
        .filter(|(key, entry)| match peer.tags.get(*key) {
            None => true,
            Some(tag) => {
                let ours = entry.tag();
                ours != *tag && ours.version >= tag.version
            }
        })
        .map(|(_, entry)| entry.clone())
        .collect()
}

/// Apply a delta to local state.
///
/// Every entry the delta carries is checked on its own first (signature, size,
/// an inviter or author unknown to both the local state and the delta), losing
/// duplicates included. Any failure rejects the whole delta and leaves the
/// local state untouched. Entries made obsolete by a tombstone are dropped by
/// the merge.
pub fn apply(
    params: &RoomParameters,
    local: &RoomState,
    delta: &RoomDelta,
) -> Result<RoomState, Rejected> {
    if delta.is_empty() {
        return Ok(local.clone());
    }

    check_entries(params, local, delta).map_err(|reason| {
        warn!(%reason, "Rejecting delta");
        Rejected::Invalid(reason)
    })?;

    let merged = merge::merge(params, local, &delta.to_patch());
    validate::validate_local(params, &merged).map_err(Rejected::Invalid)?;
    debug!(
        entries = delta.len(),
        changed = merged != *local,
        "Applied delta"
    );
    Ok(merged)
}

fn check_entries(
    params: &RoomParameters,
    local: &RoomState,
    delta: &RoomDelta,
) -> Result<(), InvalidReason> {
    let mut facts: Vec<&AuthorizedMember> = Vec::new();
    let mut profiles: Vec<&AuthorizedMemberInfo> = Vec::new();
    let mut messages: Vec<&AuthorizedMessage> = Vec::new();

    for component in delta.components.values() {
        match component {
            ComponentDelta::Configuration(cfg) => validate::check_configuration(params, cfg)?,
            ComponentDelta::Bans(entries) => {
                for ban in entries {
                    validate::check_ban(params, ban)?;
                }
            }
            ComponentDelta::Members(entries) => {
                for fact in entries {
                    validate::check_member(params, fact)?;
                    facts.push(fact);
                }
            }
            ComponentDelta::MemberInfo(entries) => {
                for info in entries {
                    validate::check_member_info(params, info)?;
                    profiles.push(info);
                }
            }
            ComponentDelta::Messages(entries) => {
                for message in entries {
                    validate::check_message(params, message)?;
                    messages.push(message);
                }
            }
        }
    }

    let (resolved, _) =
        resolve_invite_chains(params, local.members.values().chain(facts.iter().copied()));
    let known = |id: MemberId| id == params.owner || resolved.contains(&id);

    if let Some(orphan) = facts.iter().find(|fact| !known(fact.invited_by())) {
        return Err(InvalidReason::UnknownInviter {
            member: orphan.id(),
            inviter: orphan.invited_by(),
        });
    }
    if let Some(info) = profiles.iter().find(|info| !known(info.info.member)) {
        return Err(InvalidReason::AuthorNotMember {
            kind: ComponentKind::MemberInfo,
            author: info.info.member,
        });
    }
    if let Some(message) = messages.iter().find(|message| !known(message.author())) {
        return Err(InvalidReason::AuthorNotMember {
            kind: ComponentKind::Messages,
            author: message.author(),
        });
    }
    Ok(())
}
