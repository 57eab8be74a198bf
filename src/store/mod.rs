//! State Store
//!
//! Durable key→bytes mapping from contract instance identity to the committed
//! opaque state. A store is owned by a single writer per instance (see
//! `Replica`); it never interprets the bytes it holds.

pub mod persistence;

pub use persistence::{MemoryStateStore, SledStateStore};

use crate::error::StorageError;
use crate::types::{ContractInstanceId, State};

/// State Store interface
pub trait StateStore: Send + Sync {
    fn get(&self, id: &ContractInstanceId) -> Result<Option<State>, StorageError>;
    fn put(&self, id: &ContractInstanceId, state: &State) -> Result<(), StorageError>;
    fn remove(&self, id: &ContractInstanceId) -> Result<(), StorageError>;

    fn contains(&self, id: &ContractInstanceId) -> Result<bool, StorageError> {
        Ok(self.get(id)?.is_some())
    }

    /// Every instance id with a stored state, in ascending order.
    fn list_ids(&self) -> Result<Vec<ContractInstanceId>, StorageError>;
}

/// Load the state for `id`, failing if none is stored.
pub fn require_state(
    store: &dyn StateStore,
    id: &ContractInstanceId,
) -> Result<State, StorageError> {
    store.get(id)?.ok_or(StorageError::StateNotFound(*id))
}
