//! Sync coordinator exchanges over an in-process network

use super::test_utils::{encode, id, key, registry, Network, TestRoom};
use concord::codec;
use concord::component::ComponentDelta;
use concord::config::SyncConfig;
use concord::delta::RoomDelta;
use concord::room::AuthorizedMember;
use concord::sync::{Direction, PeerId, SessionPhase, SyncEvent, SyncMessage};

fn config(attempt_budget: u32) -> SyncConfig {
    SyncConfig {
        attempt_budget,
        gossip: true,
    }
}

#[test]
fn test_pull_brings_peer_up_to_date() {
    let room = TestRoom::new();
    let ahead = room.post(&room.invite(&room.base(), 0, 1), 1, "hello");

    let mut net = Network::new();
    net.add("a", room.replica(&ahead), config(3));
    net.add("b", room.replica(&room.base()), config(3));

    net.node("b").subscribe(PeerId::from("a"), Direction::Pull).unwrap();
    assert!(net.pump() >= 2);

    assert_eq!(net.state("b"), ahead);
    assert_eq!(
        net.node("b").drain_events(),
        vec![SyncEvent::Applied {
            peer: PeerId::from("a"),
            changed: true
        }]
    );
    assert_eq!(
        net.node("b").session(&PeerId::from("a")).unwrap().phase(),
        SessionPhase::Idle
    );
}

#[test]
fn test_push_delivers_to_behind_peer() {
    let room = TestRoom::new();
    let ahead = room.nickname(&room.invite(&room.base(), 0, 1), 1, 1, "one");

    let mut net = Network::new();
    net.add("a", room.replica(&ahead), config(3));
    net.add("b", room.replica(&room.base()), config(3));

    net.node("a").subscribe(PeerId::from("b"), Direction::Push).unwrap();
    net.pump();

    assert_eq!(net.state("b"), ahead);
    assert_eq!(net.state("a"), ahead);
}

#[test]
fn test_divergent_peers_converge() {
    let room = TestRoom::new();
    let left = room.post(&room.invite(&room.base(), 0, 1), 1, "left");
    let right = room.rename(&room.invite(&room.base(), 0, 2), 2, "right");

    let mut net = Network::new();
    net.add("a", room.replica(&left), config(3));
    net.add("b", room.replica(&right), config(3));

    net.node("a").subscribe(PeerId::from("b"), Direction::Pull).unwrap();
    net.node("b").subscribe(PeerId::from("a"), Direction::Pull).unwrap();
    net.pump();

    let merged = concord::merge::merge(&room.params, &left, &right);
    assert_eq!(net.state("a"), merged);
    assert_eq!(net.state("b"), merged);
}

#[test]
fn test_gossip_reaches_third_node() {
    let room = TestRoom::new();
    let base = room.base();

    let mut net = Network::new();
    net.add("a", room.replica(&base), config(3));
    net.add("b", room.replica(&base), config(3));
    net.add("c", room.replica(&base), config(3));

    net.node("b").subscribe(PeerId::from("a"), Direction::Pull).unwrap();
    net.node("b").subscribe(PeerId::from("c"), Direction::Pull).unwrap();
    net.pump();

    let update = RoomDelta::new().with(ComponentDelta::Members(vec![
        AuthorizedMember::invite(id(1), &key(0)).unwrap(),
    ]));
    let a = net.node("a");
    assert!(a
        .replica()
        .apply_delta(&codec::encode_delta(&update).unwrap())
        .unwrap()
        .changed());
    assert_eq!(a.publish_local().unwrap(), 1);
    net.pump();

    let expected = room.invite(&base, 0, 1);
    for name in ["a", "b", "c"] {
        assert_eq!(net.state(name), expected, "node {}", name);
    }
}

#[test]
fn test_unanswered_peer_degrades_then_recovers() {
    let room = TestRoom::new();
    let ahead = room.invite(&room.base(), 0, 1);

    let mut net = Network::new();
    net.add("a", room.replica(&ahead), config(2));
    net.add("b", room.replica(&room.base()), config(2));
    let a = PeerId::from("a");

    net.node("b").subscribe(a.clone(), Direction::Pull).unwrap();
    net.pump_with(|_, _| true);
    net.node("b").on_timeout(&a).unwrap();
    net.pump_with(|_, _| true);
    net.node("b").on_timeout(&a).unwrap();

    assert!(net.node("b").session(&a).unwrap().is_degraded());
    assert_eq!(
        net.node("b").drain_events(),
        vec![SyncEvent::PeerDegraded {
            peer: a.clone(),
            attempts: 2
        }]
    );

    let late = SyncMessage::Delta {
        delta: codec::encode_delta(&RoomDelta::from_state(&ahead)).unwrap(),
    };
    net.node("b").deliver(&a, late.encode().unwrap());
    net.node("b").run_until_idle().unwrap();
    assert_eq!(net.state("b"), room.base());

    net.node("b").subscribe(a.clone(), Direction::Pull).unwrap();
    net.pump();
    assert_eq!(net.state("b"), ahead);
}

#[test]
fn test_forged_delta_raises_rejection() {
    let room = TestRoom::new();
    let mut net = Network::new();
    net.add("a", room.replica(&room.base()), config(3));

    let forged = RoomDelta::new().with(ComponentDelta::Members(vec![
        AuthorizedMember::invite(id(2), &key(9)).unwrap(),
    ]));
    let message = SyncMessage::Delta {
        delta: codec::encode_delta(&forged).unwrap(),
    };
    let mallory = PeerId::from("mallory");
    let node = net.node("a");
    node.deliver(&mallory, message.encode().unwrap());
    node.run_until_idle().unwrap();

    assert!(matches!(
        node.drain_events().as_slice(),
        [SyncEvent::Rejected { peer, .. }] if *peer == mallory
    ));
    assert_eq!(net.state("a"), room.base());
}

#[test]
fn test_peer_unsubscribe_closes_remote_session() {
    let room = TestRoom::new();
    let mut net = Network::new();
    net.add("a", room.replica(&room.base()), config(3));
    net.add("b", room.replica(&room.base()), config(3));

    net.node("a").subscribe(PeerId::from("b"), Direction::Pull).unwrap();
    net.pump();
    assert!(net.node("b").session(&PeerId::from("a")).is_some());

    let farewell = net.node("a").unsubscribe(&PeerId::from("b")).unwrap().unwrap();
    assert_eq!(farewell.peer, PeerId::from("b"));
    net.node("b").deliver(&PeerId::from("a"), farewell.bytes);
    net.node("b").run_until_idle().unwrap();

    assert!(net.node("b").session(&PeerId::from("a")).is_none());
    assert!(net
        .node("b")
        .drain_events()
        .contains(&SyncEvent::Unsubscribed {
            peer: PeerId::from("a")
        }));
    assert_eq!(encode(&net.state("a")), encode(&net.state("b")));
}

#[test]
fn test_delta_waiting_on_registry_resumes_when_provided() {
    let registry_id = concord::ContractInstanceId([7u8; 32]);
    let room = TestRoom::with_registry(registry_id);
    let ahead = room.post(&room.invite(&room.base(), 0, 1), 1, "hello");
    let mut related = concord::RelatedStates::new();
    related.insert(registry_id, registry(&[1]));

    let mut net = Network::new();
    let store: std::sync::Arc<dyn concord::store::StateStore> =
        std::sync::Arc::new(concord::store::MemoryStateStore::new());
    net.add("a", room.replica_with(&ahead, related, store), config(3));
    net.add("b", room.replica(&room.base()), config(3));

    let a = PeerId::from("a");
    net.node("b").subscribe(a.clone(), Direction::Pull).unwrap();
    net.pump();

    assert_eq!(net.state("b"), room.base());
    assert_eq!(
        net.node("b").drain_events(),
        vec![SyncEvent::NeedsRelated {
            peer: a.clone(),
            ids: vec![registry_id]
        }]
    );
    let session = net.node("b").session(&a).unwrap();
    assert_eq!(session.phase(), SessionPhase::AwaitingRelated);
    assert_eq!(session.parked_deltas(), 1);

    assert_eq!(
        net.node("b").provide_related(registry_id, registry(&[1])).unwrap(),
        1
    );
    assert_eq!(net.state("b"), ahead);
    assert_eq!(
        net.node("b").drain_events(),
        vec![SyncEvent::Applied {
            peer: a.clone(),
            changed: true
        }]
    );
    let session = net.node("b").session(&a).unwrap();
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(session.parked_deltas(), 0);
}
