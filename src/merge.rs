//! Merge / reconciliation core
//!
//! `merge` is the join of a semilattice over room states: associative,
//! commutative and idempotent, with `RoomState::default()` as identity.
//!
//! Each component merges independently:
//! - configuration keeps the entry with the higher version, then the greater
//!   signature bytes;
//! - members, bans, member info and messages take the union keyed by the entry's
//!   own identity, resolving same-key conflicts the same way. Add facts are
//!   keyed by `(member, inviter)`, so competing invitations of one member all
//!   survive and any of them can anchor the member.
//!
//! Entries are checked one by one before they enter the union, so an invalid
//! entry from either side is discarded and the rest of the input survives.
//! After the union, cross-component rules are applied: add facts whose invite
//! chain does not reach the owner are dropped, and profiles or messages whose
//! author is not an effective member (including banned authors) are dropped.
//! Every fact of a valid input resolves within that input, so the chain rule
//! only ever trims invalid inputs. Merge never fails.

use crate::component::{ComponentKind, VersionedEntry};
use crate::room::{AuthorizedConfiguration, MemberRegistry, RoomParameters, RoomState};
use crate::types::MemberId;
use crate::validate::{self, resolve_invite_chains};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Merge two room states.
pub fn merge(params: &RoomParameters, a: &RoomState, b: &RoomState) -> RoomState {
    let mut merged = RoomState::default();
    for kind in ComponentKind::ALL {
        merge_component(kind, params, a, b, &mut merged);
    }
    enforce_cross_component(params, merged)
}

/// Reduce a state to its largest valid part.
pub fn normalize(params: &RoomParameters, state: &RoomState) -> RoomState {
    merge(params, state, &RoomState::default())
}

/// Remove effective members the registry no longer lists, along with the
/// invitees, profiles and messages that only they anchored.
///
/// Banned members keep their add facts: they are not in the room, and their
/// facts may still anchor other members' chains.
pub fn restrict_to_registry(
    params: &RoomParameters,
    state: &RoomState,
    registry: &MemberRegistry,
) -> RoomState {
    let revoked: BTreeSet<MemberId> = state
        .effective_members()
        .into_iter()
        .filter(|id| !registry.allows(id))
        .collect();
    if revoked.is_empty() {
        return state.clone();
    }
    debug!(revoked = revoked.len(), "Dropping members missing from the registry");
    let mut next = state.clone();
    next.members.retain(|key, _| !revoked.contains(&key.id));
    normalize(params, &next)
}

fn merge_component(
    kind: ComponentKind,
    params: &RoomParameters,
    a: &RoomState,
    b: &RoomState,
    out: &mut RoomState,
) {
    match kind {
        ComponentKind::Configuration => {
            out.configuration = [a.configuration.as_ref(), b.configuration.as_ref()]
                .into_iter()
                .flatten()
                .filter(|c| validate::check_configuration(params, c).is_ok())
                .fold(None::<&AuthorizedConfiguration>, |best, candidate| match best {
                    Some(current) if current.supersedes(candidate) => Some(current),
                    _ => Some(candidate),
                })
                .cloned();
        }
        ComponentKind::Bans => {
            out.bans = union_valid(kind, &a.bans, &b.bans, |e| {
                validate::check_ban(params, e).is_ok()
            });
        }
        ComponentKind::Members => {
            out.members = union_valid(kind, &a.members, &b.members, |e| {
                validate::check_member(params, e).is_ok()
            });
        }
        ComponentKind::MemberInfo => {
            out.member_info = union_valid(kind, &a.member_info, &b.member_info, |e| {
                validate::check_member_info(params, e).is_ok()
            });
        }
        ComponentKind::Messages => {
            out.messages = union_valid(kind, &a.messages, &b.messages, |e| {
                validate::check_message(params, e).is_ok()
            });
        }
    }
}

/// Union of two keyed components, keeping only entries that pass `valid`.
/// Entries are re-keyed by their own identity.
fn union_valid<E, F>(
    kind: ComponentKind,
    a: &BTreeMap<E::Key, E>,
    b: &BTreeMap<E::Key, E>,
    valid: F,
) -> BTreeMap<E::Key, E>
where
    E: VersionedEntry,
    F: Fn(&E) -> bool,
{
    let mut out: BTreeMap<E::Key, E> = BTreeMap::new();
    let mut dropped = 0usize;
    for entry in a.values().chain(b.values()) {
        if !valid(entry) {
            dropped += 1;
            continue;
        }
        match out.get(&entry.key()) {
            Some(existing) if existing.supersedes(entry) => {}
            _ => {
                out.insert(entry.key(), entry.clone());
            }
        }
    }
    if dropped > 0 {
        debug!(component = %kind, dropped, "Dropped invalid entries during merge");
    }
    out
}

fn enforce_cross_component(params: &RoomParameters, mut state: RoomState) -> RoomState {
    let (resolved, unresolved) = resolve_invite_chains(params, state.members.values());
    if !unresolved.is_empty() {
        debug!(
            dropped = unresolved.len(),
            "Dropped add facts without an invite chain to the owner"
        );
        state
            .members
            .retain(|key, _| key.invited_by == params.owner || resolved.contains(&key.invited_by));
    }

    let effective = state.effective_members();
    let is_effective = |id: &MemberId| *id == params.owner || effective.contains(id);

    let before = state.member_info.len();
    state.member_info.retain(|id, _| is_effective(id));
    let before_messages = state.messages.len();
    state.messages.retain(|id, _| is_effective(&id.author));

    let dropped = (before - state.member_info.len()) + (before_messages - state.messages.len());
    if dropped > 0 {
        debug!(dropped, "Dropped entries authored by non-members");
    }
    state
}
