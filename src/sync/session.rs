//! Per-peer protocol session

use crate::sync::message::SyncMessage;
use crate::types::{StateDelta, StateSummary};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Transport-level name of a peer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Which side starts an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Request the peer's delta for our summary.
    Pull,
    /// Announce our summary and wait to be asked.
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    SummaryRequested { attempt: u32 },
    SummaryPushed { attempt: u32 },
    DeltaReceived,
    /// A received delta is parked until related states arrive.
    AwaitingRelated,
    Applied,
    Degraded,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::SummaryRequested { .. } => "summary_requested",
            SessionPhase::SummaryPushed { .. } => "summary_pushed",
            SessionPhase::DeltaReceived => "delta_received",
            SessionPhase::AwaitingRelated => "awaiting_related",
            SessionPhase::Applied => "applied",
            SessionPhase::Degraded => "degraded",
        }
    }

    /// Outstanding exchange awaiting a reply, with its attempt count.
    pub fn awaiting(self) -> Option<(Direction, u32)> {
        match self {
            SessionPhase::SummaryRequested { attempt } => Some((Direction::Pull, attempt)),
            SessionPhase::SummaryPushed { attempt } => Some((Direction::Push, attempt)),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PeerSession {
    peer: PeerId,
    phase: SessionPhase,
    last_known_summary: Option<StateSummary>,
    parked: Vec<StateDelta>,
    pub(crate) inbox: VecDeque<Vec<u8>>,
    pub(crate) outbox: VecDeque<SyncMessage>,
}

impl PeerSession {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            phase: SessionPhase::Idle,
            last_known_summary: None,
            parked: Vec::new(),
            inbox: VecDeque::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_degraded(&self) -> bool {
        self.phase == SessionPhase::Degraded
    }

    pub fn last_known_summary(&self) -> Option<&StateSummary> {
        self.last_known_summary.as_ref()
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbox.len()
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbox.len()
    }

    /// Deltas held back until related states are provided.
    pub fn parked_deltas(&self) -> usize {
        self.parked.len()
    }

    pub(crate) fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    pub(crate) fn remember_summary(&mut self, summary: StateSummary) {
        self.last_known_summary = Some(summary);
    }

    pub(crate) fn send(&mut self, message: SyncMessage) {
        self.outbox.push_back(message);
    }

    pub(crate) fn park(&mut self, delta: StateDelta) {
        if !self.parked.contains(&delta) {
            self.parked.push(delta);
        }
        self.phase = SessionPhase::AwaitingRelated;
    }

    pub(crate) fn take_parked(&mut self) -> Vec<StateDelta> {
        std::mem::take(&mut self.parked)
    }
}
