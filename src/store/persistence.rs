//! Persistence layer for the State Store

use crate::error::StorageError;
use crate::store::StateStore;
use crate::types::{ContractInstanceId, State};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;

/// Sled-based implementation of StateStore
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    /// Open (or create) a sled database at the given directory.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Ok(Self { db })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

impl StateStore for SledStateStore {
    fn get(&self, id: &ContractInstanceId) -> Result<Option<State>, StorageError> {
        Ok(self
            .db
            .get(id.as_bytes())?
            .map(|value| State::new(value.to_vec())))
    }

    fn put(&self, id: &ContractInstanceId, state: &State) -> Result<(), StorageError> {
        self.db.insert(id.as_bytes(), state.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, id: &ContractInstanceId) -> Result<(), StorageError> {
        self.db.remove(id.as_bytes())?;
        Ok(())
    }

    fn contains(&self, id: &ContractInstanceId) -> Result<bool, StorageError> {
        Ok(self.db.contains_key(id.as_bytes())?)
    }

    fn list_ids(&self) -> Result<Vec<ContractInstanceId>, StorageError> {
        let mut ids = Vec::new();
        for key in self.db.iter().keys() {
            let key = key?;
            // Only 32-byte keys are instance ids
            let Ok(bytes) = <[u8; 32]>::try_from(key.as_ref()) else {
                continue;
            };
            ids.push(ContractInstanceId(bytes));
        }
        Ok(ids)
    }
}

/// In-memory StateStore, for tests and ephemeral hosts
#[derive(Default)]
pub struct MemoryStateStore {
    states: RwLock<BTreeMap<ContractInstanceId, State>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, id: &ContractInstanceId) -> Result<Option<State>, StorageError> {
        Ok(self.states.read().get(id).cloned())
    }

    fn put(&self, id: &ContractInstanceId, state: &State) -> Result<(), StorageError> {
        self.states.write().insert(*id, state.clone());
        Ok(())
    }

    fn remove(&self, id: &ContractInstanceId) -> Result<(), StorageError> {
        self.states.write().remove(id);
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<ContractInstanceId>, StorageError> {
        Ok(self.states.read().keys().copied().collect())
    }
}
