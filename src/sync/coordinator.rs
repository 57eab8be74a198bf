//! Coordinator driving the summary/delta exchange with every subscribed peer
//!
//! Pull: `RequestDelta{ours}` → SummaryRequested → `Delta` → DeltaReceived →
//! apply → Applied → gossip → Idle. Push: `Announce{ours}` → SummaryPushed →
//! `RequestDelta{theirs}` answered with `Delta` or `UpToDate` → Idle.
//! A delta that needs related states is parked (AwaitingRelated) until the
//! host calls `provide_related`.
//!
//! Only the replica's apply mutates shared state, so a session can be torn
//! down between any two steps without rollback.

use crate::config::SyncConfig;
use crate::contract::ContractInterface;
use crate::error::{ContractError, SyncError};
use crate::replica::{Replica, ReplicaUpdate};
use crate::sync::message::{Envelope, SyncMessage};
use crate::sync::session::{Direction, PeerId, PeerSession, SessionPhase};
use crate::types::{ContractInstanceId, State, StateDelta, StateSummary};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notifications for the networking layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Applied { peer: PeerId, changed: bool },
    /// Inbound data was dropped; local state is unchanged.
    Rejected { peer: PeerId, reason: String },
    NeedsRelated { peer: PeerId, ids: Vec<ContractInstanceId> },
    PeerDegraded { peer: PeerId, attempts: u32 },
    Unsubscribed { peer: PeerId },
}

pub struct SyncCoordinator<C: ContractInterface> {
    replica: Arc<Replica<C>>,
    config: SyncConfig,
    sessions: BTreeMap<PeerId, PeerSession>,
    events: VecDeque<SyncEvent>,
}

impl<C: ContractInterface> SyncCoordinator<C> {
    pub fn new(replica: Arc<Replica<C>>, config: SyncConfig) -> Self {
        Self {
            replica,
            config,
            sessions: BTreeMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn replica(&self) -> &Arc<Replica<C>> {
        &self.replica
    }

    pub fn session(&self, peer: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.sessions.keys()
    }

    /// Start (or restart) a session. Restarting clears a degraded state.
    pub fn subscribe(&mut self, peer: PeerId, direction: Direction) -> Result<(), SyncError> {
        let summary = self.replica.summary()?;
        let session = self
            .sessions
            .entry(peer.clone())
            .or_insert_with(|| PeerSession::new(peer.clone()));
        start_exchange(session, direction, summary, 1);
        info!(peer = %peer, ?direction, "Subscribed peer");
        Ok(())
    }

    /// Tear a session down. Returns the farewell envelope for the transport.
    pub fn unsubscribe(&mut self, peer: &PeerId) -> Result<Option<Envelope>, SyncError> {
        if self.sessions.remove(peer).is_none() {
            return Ok(None);
        }
        self.events.push_back(SyncEvent::Unsubscribed { peer: peer.clone() });
        info!(peer = %peer, "Unsubscribed peer");
        Ok(Some(Envelope {
            peer: peer.clone(),
            bytes: SyncMessage::Unsubscribe.encode()?,
        }))
    }

    /// Queue inbound bytes from `peer`. Traffic from a new peer opens an idle
    /// session.
    pub fn deliver(&mut self, peer: &PeerId, bytes: Vec<u8>) {
        self.sessions
            .entry(peer.clone())
            .or_insert_with(|| PeerSession::new(peer.clone()))
            .inbox
            .push_back(bytes);
    }

    /// Process inbound messages until every inbox is empty. Returns the number
    /// of messages handled.
    pub fn run_until_idle(&mut self) -> Result<usize, SyncError> {
        let mut handled = 0;
        while let Some((peer, bytes)) = self.next_inbound() {
            self.handle(&peer, &bytes)?;
            handled += 1;
        }
        Ok(handled)
    }

    fn next_inbound(&mut self) -> Option<(PeerId, Vec<u8>)> {
        self.sessions.iter_mut().find_map(|(peer, session)| {
            session.inbox.pop_front().map(|bytes| (peer.clone(), bytes))
        })
    }

    /// A reply did not arrive in time: resend with a fresh summary, or mark the
    /// peer degraded once the attempt budget is spent.
    pub fn on_timeout(&mut self, peer: &PeerId) -> Result<(), SyncError> {
        let budget = self.config.attempt_budget;
        let summary = self.replica.summary()?;
        let session = self
            .sessions
            .get_mut(peer)
            .ok_or_else(|| SyncError::UnknownPeer(peer.to_string()))?;

        if session.is_degraded() {
            return Err(SyncError::Degraded {
                peer: peer.to_string(),
                attempts: budget,
            });
        }
        let Some((direction, attempt)) = session.phase().awaiting() else {
            debug!(peer = %peer, phase = session.phase().as_str(), "Timeout with nothing outstanding");
            return Ok(());
        };

        if attempt >= budget {
            session.set_phase(SessionPhase::Degraded);
            session.outbox.clear();
            warn!(peer = %peer, attempts = attempt, "Peer degraded");
            self.events.push_back(SyncEvent::PeerDegraded {
                peer: peer.clone(),
                attempts: attempt,
            });
        } else {
            debug!(peer = %peer, attempt = attempt + 1, "Retrying exchange");
            start_exchange(session, direction, summary, attempt + 1);
        }
        Ok(())
    }

    /// Hand a related instance's state to the replica and re-apply the deltas
    /// parked while it was missing. Returns how many of them were committed.
    pub fn provide_related(
        &mut self,
        id: ContractInstanceId,
        state: State,
    ) -> Result<usize, SyncError> {
        self.replica.provide_related(id, state);
        let parked: Vec<(PeerId, Vec<StateDelta>)> = self
            .sessions
            .iter_mut()
            .map(|(peer, session)| (peer.clone(), session.take_parked()))
            .filter(|(_, deltas)| !deltas.is_empty())
            .collect();

        let mut committed = 0;
        for (peer, deltas) in parked {
            debug!(peer = %peer, count = deltas.len(), "Re-applying parked deltas");
            for delta in deltas {
                if self.on_delta(&peer, delta)? {
                    committed += 1;
                }
            }
        }
        Ok(committed)
    }

    /// Offer a local change to every healthy peer. Returns how many were sent
    /// something.
    pub fn publish_local(&mut self) -> Result<usize, SyncError> {
        self.gossip(None)
    }

    /// Encoded outbound traffic for the transport, in session order.
    pub fn drain_outbox(&mut self) -> Result<Vec<Envelope>, SyncError> {
        let mut envelopes = Vec::new();
        for (peer, session) in self.sessions.iter_mut() {
            while let Some(message) = session.outbox.pop_front() {
                envelopes.push(Envelope {
                    peer: peer.clone(),
                    bytes: message.encode()?,
                });
            }
        }
        Ok(envelopes)
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.events.drain(..).collect()
    }

    fn handle(&mut self, peer: &PeerId, bytes: &[u8]) -> Result<(), SyncError> {
        let message = match SyncMessage::decode(bytes) {
            Ok(m) => m,
            Err(e) => {
                self.reject(peer, e.to_string());
                return Ok(());
            }
        };
        if self.sessions.get(peer).map_or(true, PeerSession::is_degraded) {
            debug!(peer = %peer, kind = message.kind(), "Ignoring message for degraded session");
            return Ok(());
        }
        debug!(peer = %peer, kind = message.kind(), "Handling message");

        match message {
            SyncMessage::Announce { summary } => self.on_announce(peer, summary),
            SyncMessage::RequestDelta { summary } => self.on_request_delta(peer, summary),
            SyncMessage::Delta { delta } => self.on_delta(peer, delta).map(|_| ()),
            SyncMessage::UpToDate => {
                self.set_phase(peer, SessionPhase::Idle);
                Ok(())
            }
            SyncMessage::Unsubscribe => {
                self.sessions.remove(peer);
                self.events.push_back(SyncEvent::Unsubscribed { peer: peer.clone() });
                Ok(())
            }
        }
    }

    fn on_announce(&mut self, peer: &PeerId, summary: StateSummary) -> Result<(), SyncError> {
        let offer = match self.replica.delta_for(&summary) {
            Ok(delta) => delta,
            Err(SyncError::Contract(e)) => {
                self.reject(peer, e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let ours = self.replica.summary()?;
        if let Some(session) = self.sessions.get_mut(peer) {
            session.remember_summary(summary);
            if let Some(delta) = offer {
                session.send(SyncMessage::Delta { delta });
            }
            start_exchange(session, Direction::Pull, ours, 1);
        }
        Ok(())
    }

    fn on_request_delta(&mut self, peer: &PeerId, summary: StateSummary) -> Result<(), SyncError> {
        let reply = match self.replica.delta_for(&summary) {
            Ok(Some(delta)) => SyncMessage::Delta { delta },
            Ok(None) => SyncMessage::UpToDate,
            Err(SyncError::Contract(e)) => {
                self.reject(peer, e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if let Some(session) = self.sessions.get_mut(peer) {
            session.remember_summary(summary);
            session.send(reply);
            if matches!(session.phase(), SessionPhase::SummaryPushed { .. }) {
                session.set_phase(SessionPhase::Idle);
            }
        }
        Ok(())
    }

    /// Returns whether the delta was committed.
    fn on_delta(&mut self, peer: &PeerId, delta: StateDelta) -> Result<bool, SyncError> {
        self.set_phase(peer, SessionPhase::DeltaReceived);
        let outcome = match self.replica.apply_delta(&delta) {
            Ok(outcome) => outcome,
            Err(SyncError::Contract(e)) => {
                self.reject(peer, e.to_string());
                self.set_phase(peer, SessionPhase::Idle);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        match outcome {
            ReplicaUpdate::Committed { changed } => {
                self.set_phase(peer, SessionPhase::Applied);
                self.events.push_back(SyncEvent::Applied {
                    peer: peer.clone(),
                    changed,
                });
                if changed && self.config.gossip {
                    self.gossip(Some(peer))?;
                }
                self.set_phase(peer, SessionPhase::Idle);
                Ok(true)
            }
            ReplicaUpdate::NeedsRelated(ids) => {
                if let Some(session) = self.sessions.get_mut(peer) {
                    session.park(delta);
                }
                self.events.push_back(SyncEvent::NeedsRelated {
                    peer: peer.clone(),
                    ids,
                });
                Ok(false)
            }
        }
    }

    /// Send each other healthy peer a delta relative to its last known
    /// summary, or an announcement if none is known.
    fn gossip(&mut self, except: Option<&PeerId>) -> Result<usize, SyncError> {
        let ours = self.replica.summary()?;
        let mut notified = 0;
        for (peer, session) in self.sessions.iter_mut() {
            if Some(peer) == except || session.is_degraded() {
                continue;
            }
            let delta = match session.last_known_summary() {
                Some(summary) => match self.replica.delta_for(summary) {
                    Ok(delta) => delta,
                    Err(SyncError::Contract(ContractError::Invalid(_))) => None,
                    Err(e) => return Err(e),
                },
                None => None,
            };
            match delta {
                Some(delta) => session.send(SyncMessage::Delta { delta }),
                None if session.last_known_summary().is_some() => continue,
                None => start_exchange(session, Direction::Push, ours.clone(), 1),
            }
            notified += 1;
        }
        debug!(notified, "Gossiped update");
        Ok(notified)
    }

    fn set_phase(&mut self, peer: &PeerId, phase: SessionPhase) {
        if let Some(session) = self.sessions.get_mut(peer) {
            session.set_phase(phase);
        }
    }

    fn reject(&mut self, peer: &PeerId, reason: String) {
        warn!(peer = %peer, %reason, "Dropped inbound data");
        self.events.push_back(SyncEvent::Rejected {
            peer: peer.clone(),
            reason,
        });
    }
}

fn start_exchange(
    session: &mut PeerSession,
    direction: Direction,
    summary: StateSummary,
    attempt: u32,
) {
    match direction {
        Direction::Pull => {
            session.send(SyncMessage::RequestDelta { summary });
            session.set_phase(SessionPhase::SummaryRequested { attempt });
        }
        Direction::Push => {
            session.send(SyncMessage::Announce { summary });
            session.set_phase(SessionPhase::SummaryPushed { attempt });
        }
    }
}
