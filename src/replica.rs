//! Replica: the single writer for one contract instance
//!
//! Holds the latest committed state behind a mutex. Every apply or merge runs
//! against that state inside the lock and is written through to the store
//! before the lock is released, so concurrent appliers are strictly ordered.
//! Merge commutativity makes the order irrelevant to the final value.

use crate::contract::{ContractInterface, ContractKey, UpdateData, UpdateOutcome};
use crate::error::{ContractError, SyncError};
use crate::store::{require_state, StateStore};
use crate::types::{ContractInstanceId, Parameters, State, StateDelta, StateSummary};
use crate::validate::{RelatedStates, Validation};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an update against a replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaUpdate {
    Committed { changed: bool },
    /// Nothing was committed; supply these via `provide_related` and retry.
    NeedsRelated(Vec<ContractInstanceId>),
}

impl ReplicaUpdate {
    pub fn changed(&self) -> bool {
        matches!(self, ReplicaUpdate::Committed { changed: true })
    }
}

pub struct Replica<C: ContractInterface> {
    contract: C,
    key: ContractKey,
    parameters: Parameters,
    state: Mutex<State>,
    related: Mutex<RelatedStates>,
    store: Arc<dyn StateStore>,
}

impl<C: ContractInterface> Replica<C> {
    /// Publish a new instance from its initial state.
    pub fn create(
        contract: C,
        parameters: Parameters,
        initial: State,
        related: RelatedStates,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, SyncError> {
        match contract.validate_state(&parameters, &initial, &related)? {
            Validation::Valid => {}
            Validation::Invalid(reason) => {
                return Err(SyncError::Contract(ContractError::Invalid(reason)))
            }
            Validation::NeedsRelated(ids) => return Err(SyncError::NeedsRelated(ids)),
        }
        let key = contract.key(&parameters);
        store.put(&key.instance, &initial)?;
        info!(instance = %key, bytes = initial.len(), "Created replica");
        Ok(Self {
            contract,
            key,
            parameters,
            state: Mutex::new(initial),
            related: Mutex::new(related),
            store,
        })
    }

    /// Reopen an instance from the store.
    pub fn open(
        contract: C,
        parameters: Parameters,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, SyncError> {
        let key = contract.key(&parameters);
        let state = require_state(store.as_ref(), &key.instance)?;
        debug!(instance = %key, bytes = state.len(), "Opened replica");
        Ok(Self {
            contract,
            key,
            parameters,
            state: Mutex::new(state),
            related: Mutex::new(RelatedStates::new()),
            store,
        })
    }

    pub fn key(&self) -> &ContractKey {
        &self.key
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// Snapshot of the committed state.
    pub fn state(&self) -> State {
        self.state.lock().clone()
    }

    pub fn summary(&self) -> Result<StateSummary, SyncError> {
        let state = self.state();
        Ok(self.contract.summarize_state(&self.parameters, &state)?)
    }

    /// Delta a peer holding `summary` is missing.
    pub fn delta_for(&self, summary: &StateSummary) -> Result<Option<StateDelta>, SyncError> {
        let state = self.state();
        Ok(self
            .contract
            .get_state_delta(&self.parameters, &state, summary)?)
    }

    pub fn apply_delta(&self, delta: &StateDelta) -> Result<ReplicaUpdate, SyncError> {
        self.update(vec![UpdateData::Delta(delta.clone())])
    }

    pub fn merge_state(&self, incoming: &State) -> Result<ReplicaUpdate, SyncError> {
        self.update(vec![UpdateData::State(incoming.clone())])
    }

    /// Cache a related instance's state for later validations.
    pub fn provide_related(&self, id: ContractInstanceId, state: State) {
        self.related.lock().insert(id, state);
    }

    /// Apply updates atomically against the latest committed state.
    pub fn update(&self, updates: Vec<UpdateData>) -> Result<ReplicaUpdate, SyncError> {
        let related = self.related.lock().clone();
        let mut state = self.state.lock();

        let mut all = updates;
        all.extend(related.iter().map(|(id, s)| UpdateData::RelatedState {
            related_to: *id,
            state: s.clone(),
        }));

        match self.contract.update_state(&self.parameters, &state, all)? {
            UpdateOutcome::Updated(next) => {
                let changed = next != *state;
                if changed {
                    self.store.put(&self.key.instance, &next)?;
                    info!(instance = %self.key, bytes = next.len(), "Committed state");
                    *state = next;
                }
                Ok(ReplicaUpdate::Committed { changed })
            }
            UpdateOutcome::NeedsRelated(ids) => {
                debug!(instance = %self.key, needed = ids.len(), "Update waiting on related states");
                Ok(ReplicaUpdate::NeedsRelated(ids))
            }
        }
    }
}
