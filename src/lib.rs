//! Concord: Deterministic Replicated-State Synchronization
//!
//! Lets independent, mutually untrusted peers converge on identical state for
//! a contract instance by exchanging compact summaries and deltas. The merge
//! of two states is a semilattice join, so any set of updates received in any
//! order or grouping produces the same result on every replica.

pub mod cli;
pub mod codec;
pub mod component;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod delta;
pub mod error;
pub mod logging;
pub mod merge;
pub mod replica;
pub mod room;
pub mod store;
pub mod summary;
pub mod sync;
pub mod types;
pub mod validate;

pub use contract::{ContractInterface, RoomContract, UpdateData, UpdateOutcome};
pub use error::{ApiError, CodecError, ContractError, Rejected, StorageError, SyncError};
pub use replica::{Replica, ReplicaUpdate};
pub use types::{ContractInstanceId, MemberId, Parameters, State, StateDelta, StateSummary};
pub use validate::{RelatedStates, Validation};
