//! Synchronization coordinator
//!
//! One sequential protocol session per peer relationship, driven by a
//! single-threaded loop over per-session inboxes and outboxes. The transport
//! only ever sees encoded `Envelope`s.

pub mod coordinator;
pub mod message;
pub mod session;

pub use coordinator::{SyncCoordinator, SyncEvent};
pub use message::{Envelope, SyncMessage};
pub use session::{Direction, PeerId, PeerSession, SessionPhase};
