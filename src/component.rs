//! Component kinds and per-kind dispatch
//!
//! The set of components is closed: `ComponentKind` enumerates them and every
//! per-component operation (summarize, delta, fold) is selected with a `match`
//! on the kind rather than through trait objects.

use crate::crypto::SignatureBytes;
use crate::room::{
    AuthorizedBan, AuthorizedConfiguration, AuthorizedMember, AuthorizedMemberInfo,
    AuthorizedMessage, Member, MessageId, RoomState,
};
use crate::summary::{self, KeyedSummary};
use crate::types::MemberId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable component identifiers. The numeric id is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Configuration,
    Members,
    Bans,
    MemberInfo,
    Messages,
}

impl ComponentKind {
    /// Every kind, in the order merge and normalization visit them.
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Configuration,
        ComponentKind::Bans,
        ComponentKind::Members,
        ComponentKind::MemberInfo,
        ComponentKind::Messages,
    ];

    pub fn id(self) -> u16 {
        match self {
            ComponentKind::Configuration => 1,
            ComponentKind::Members => 2,
            ComponentKind::Bans => 3,
            ComponentKind::MemberInfo => 4,
            ComponentKind::Messages => 5,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            1 => Some(ComponentKind::Configuration),
            2 => Some(ComponentKind::Members),
            3 => Some(ComponentKind::Bans),
            4 => Some(ComponentKind::MemberInfo),
            5 => Some(ComponentKind::Messages),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Configuration => "configuration",
            ComponentKind::Members => "members",
            ComponentKind::Bans => "bans",
            ComponentKind::MemberInfo => "member_info",
            ComponentKind::Messages => "messages",
        }
    }

    /// Fingerprint of this component, `None` when the component is empty.
    pub fn summarize(self, state: &RoomState) -> Option<ComponentSummary> {
        match self {
            ComponentKind::Configuration => state
                .configuration
                .as_ref()
                .map(|c| ComponentSummary::Configuration(c.tag())),
            ComponentKind::Members => {
                summary::summarize_keyed(&state.members).map(ComponentSummary::Members)
            }
            ComponentKind::Bans => summary::summarize_keyed(&state.bans).map(ComponentSummary::Bans),
            ComponentKind::MemberInfo => {
                summary::summarize_keyed(&state.member_info).map(ComponentSummary::MemberInfo)
            }
            ComponentKind::Messages => {
                summary::summarize_keyed(&state.messages).map(ComponentSummary::Messages)
            }
        }
    }

    /// Entries of this component the holder of `peer` is missing.
    ///
    /// A missing or mismatched peer summary yields the whole component.
    pub fn missing(self, state: &RoomState, peer: Option<&ComponentSummary>) -> Option<ComponentDelta> {
        match self {
            ComponentKind::Configuration => {
                let local = state.configuration.as_ref()?;
                let peer_tag = match peer {
                    Some(ComponentSummary::Configuration(tag)) => Some(*tag),
                    _ => None,
                };
                crate::delta::configuration_missing(local, peer_tag)
                    .then(|| ComponentDelta::Configuration(local.clone()))
            }
            ComponentKind::Members => {
                let peer = match peer {
                    Some(ComponentSummary::Members(s)) => Some(s),
                    _ => None,
                };
                non_empty(crate::delta::keyed_missing(&state.members, peer))
                    .map(ComponentDelta::Members)
            }
            ComponentKind::Bans => {
                let peer = match peer {
                    Some(ComponentSummary::Bans(s)) => Some(s),
                    _ => None,
                };
                non_empty(crate::delta::keyed_missing(&state.bans, peer)).map(ComponentDelta::Bans)
            }
            ComponentKind::MemberInfo => {
                let peer = match peer {
                    Some(ComponentSummary::MemberInfo(s)) => Some(s),
                    _ => None,
                };
                non_empty(crate::delta::keyed_missing(&state.member_info, peer))
                    .map(ComponentDelta::MemberInfo)
            }
            ComponentKind::Messages => {
                let peer = match peer {
                    Some(ComponentSummary::Messages(s)) => Some(s),
                    _ => None,
                };
                non_empty(crate::delta::keyed_missing(&state.messages, peer))
                    .map(ComponentDelta::Messages)
            }
        }
    }
}

fn non_empty<T>(entries: Vec<T>) -> Option<Vec<T>> {
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Version marker and content-derived tag of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryTag {
    pub version: u64,
    pub fingerprint: u64,
}

/// An entry of a mergeable component. Conflicts on the same key are resolved
/// by version, then by signature bytes, never by arrival order.
pub trait VersionedEntry: Clone {
    type Key: Ord + Copy;

    fn key(&self) -> Self::Key;

    fn version(&self) -> u64 {
        0
    }

    fn signature(&self) -> &SignatureBytes;

    fn tag(&self) -> EntryTag {
        EntryTag {
            version: self.version(),
            fingerprint: self.signature().fingerprint(),
        }
    }

    /// Whether `self` wins over `other` for the same key.
    fn supersedes(&self, other: &Self) -> bool {
        (self.version(), self.signature()) > (other.version(), other.signature())
    }
}

/// Per-component summary payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentSummary {
    Configuration(EntryTag),
    Members(KeyedSummary<Member>),
    Bans(KeyedSummary<MemberId>),
    MemberInfo(KeyedSummary<MemberId>),
    Messages(KeyedSummary<MessageId>),
}

impl ComponentSummary {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentSummary::Configuration(_) => ComponentKind::Configuration,
            ComponentSummary::Members(_) => ComponentKind::Members,
            ComponentSummary::Bans(_) => ComponentKind::Bans,
            ComponentSummary::MemberInfo(_) => ComponentKind::MemberInfo,
            ComponentSummary::Messages(_) => ComponentKind::Messages,
        }
    }
}

/// Per-component delta payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentDelta {
    Configuration(AuthorizedConfiguration),
    Members(Vec<AuthorizedMember>),
    Bans(Vec<AuthorizedBan>),
    MemberInfo(Vec<AuthorizedMemberInfo>),
    Messages(Vec<AuthorizedMessage>),
}

impl ComponentDelta {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentDelta::Configuration(_) => ComponentKind::Configuration,
            ComponentDelta::Members(_) => ComponentKind::Members,
            ComponentDelta::Bans(_) => ComponentKind::Bans,
            ComponentDelta::MemberInfo(_) => ComponentKind::MemberInfo,
            ComponentDelta::Messages(_) => ComponentKind::Messages,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ComponentDelta::Configuration(_) => false,
            ComponentDelta::Members(v) => v.is_empty(),
            ComponentDelta::Bans(v) => v.is_empty(),
            ComponentDelta::MemberInfo(v) => v.is_empty(),
            ComponentDelta::Messages(v) => v.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ComponentDelta::Configuration(_) => 1,
            ComponentDelta::Members(v) => v.len(),
            ComponentDelta::Bans(v) => v.len(),
            ComponentDelta::MemberInfo(v) => v.len(),
            ComponentDelta::Messages(v) => v.len(),
        }
    }

    /// Fold the entries into a partial state. Same-key entries keep the winner.
    pub fn fold_into(&self, patch: &mut RoomState) {
        match self {
            ComponentDelta::Configuration(c) => {
                let keep_existing = patch
                    .configuration
                    .as_ref()
                    .is_some_and(|existing| existing.supersedes(c));
                if !keep_existing {
                    patch.configuration = Some(c.clone());
                }
            }
            ComponentDelta::Members(entries) => fold_keyed(&mut patch.members, entries),
            ComponentDelta::Bans(entries) => fold_keyed(&mut patch.bans, entries),
            ComponentDelta::MemberInfo(entries) => fold_keyed(&mut patch.member_info, entries),
            ComponentDelta::Messages(entries) => fold_keyed(&mut patch.messages, entries),
        }
    }
}

fn fold_keyed<E: VersionedEntry>(map: &mut std::collections::BTreeMap<E::Key, E>, entries: &[E]) {
    for entry in entries {
        match map.get(&entry.key()) {
            Some(existing) if existing.supersedes(entry) || existing.tag() == entry.tag() => {}
            _ => {
                map.insert(entry.key(), entry.clone());
            }
        }
    }
}
