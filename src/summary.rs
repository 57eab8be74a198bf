//! Summarizer
//!
//! A summary lists, per non-empty component, a digest of the component and
//! one `EntryTag` per entry. It depends only on the state value, never on how
//! the state was reached, and leaves out the bulk of every entry (content and
//! signatures), so it is strictly smaller than the state it describes.

use crate::component::{ComponentKind, ComponentSummary, EntryTag, VersionedEntry};
use crate::crypto;
use crate::room::{RoomParameters, RoomState};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fingerprint of a keyed component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedSummary<K: Ord> {
    pub digest: Hash,
    pub tags: BTreeMap<K, EntryTag>,
}

/// Summary of a whole room state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomSummary {
    pub components: BTreeMap<ComponentKind, ComponentSummary>,
}

impl RoomSummary {
    pub fn get(&self, kind: ComponentKind) -> Option<&ComponentSummary> {
        self.components.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Summarize a room state. Deterministic in `(parameters, state)`.
pub fn summarize(_params: &RoomParameters, state: &RoomState) -> RoomSummary {
    let components = ComponentKind::ALL
        .iter()
        .filter_map(|kind| kind.summarize(state).map(|s| (*kind, s)))
        .collect();
    RoomSummary { components }
}

/// Digest of a keyed component: hash over the ordered (key tag) pairs.
pub fn keyed_digest<E: VersionedEntry>(entries: &BTreeMap<E::Key, E>) -> Hash
where
    E::Key: Serialize,
{
    let tags: Vec<(E::Key, EntryTag)> = entries.iter().map(|(k, e)| (*k, e.tag())).collect();
    match bincode::serialize(&tags) {
        Ok(bytes) => crypto::compute_hash(&bytes),
        // Serializing plain keys and integers cannot fail; an all-zero digest
        // never matches a real one, so the peer just gets a superset delta.
        Err(_) => [0u8; 32],
    }
}

pub(crate) fn summarize_keyed<E: VersionedEntry>(
    entries: &BTreeMap<E::Key, E>,
) -> Option<KeyedSummary<E::Key>>
where
    E::Key: Serialize,
{
    if entries.is_empty() {
        return None;
    }
    Some(KeyedSummary {
        digest: keyed_digest(entries),
        tags: entries.iter().map(|(k, e)| (*k, e.tag())).collect(),
    })
}
