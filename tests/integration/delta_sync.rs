//! Delta computation and application between replicas

use super::test_utils::{id, TestRoom};
use concord::codec;
use concord::component::{ComponentDelta, ComponentKind};
use concord::delta::{apply, delta_from, RoomDelta};
use concord::merge::merge;
use concord::room::{AuthorizedMember, RoomState};
use concord::summary::summarize;
use concord::Rejected;

#[test]
fn test_delta_from_summary_then_apply_equals_merge() {
    let room = TestRoom::new();
    let base = room.base();
    let a = room.post(&room.invite(&base, 0, 1), 1, "from a");
    let b = room.nickname(&room.post(&room.invite(&base, 0, 2), 2, "from b"), 2, 1, "bo");

    let delta = delta_from(&room.params, &b, &summarize(&room.params, &a)).unwrap();
    let applied = apply(&room.params, &a, &delta).unwrap();
    assert_eq!(applied, merge(&room.params, &a, &b));
}

#[test]
fn test_delta_only_carries_changed_components() {
    let room = TestRoom::new();
    let old = room.invite(&room.invite(&room.base(), 0, 1), 0, 2);
    let new = room.post(&old, 1, "only messages changed");

    let delta = delta_from(&room.params, &new, &summarize(&room.params, &old)).unwrap();
    assert_eq!(
        delta.components.keys().copied().collect::<Vec<_>>(),
        vec![ComponentKind::Messages]
    );
    assert_eq!(delta.len(), 1);
}

#[test]
fn test_stale_summary_yields_superset() {
    let room = TestRoom::new();
    let v1 = room.invite(&room.base(), 0, 1);
    let v2 = room.post(&v1, 1, "one");
    let v3 = room.post(&v2, 1, "two");

    // Peer actually holds v2 but reports v1.
    let delta = delta_from(&room.params, &v3, &summarize(&room.params, &v1)).unwrap();
    assert_eq!(delta.len(), 2);
    assert_eq!(apply(&room.params, &v2, &delta).unwrap(), v3);
}

#[test]
fn test_rejection_leaves_local_state_unchanged() {
    let room = TestRoom::new();
    let local = room.invite(&room.base(), 0, 1);
    let local_bytes = codec::encode_state(&local).unwrap();

    let bogus = codec::encode_raw_delta(vec![(0x7fff, vec![0, 1, 2])]).unwrap();
    assert_eq!(
        codec::decode_delta(&bogus).unwrap_err(),
        Rejected::UnknownComponent(0x7fff)
    );
    assert_eq!(codec::encode_state(&local).unwrap(), local_bytes);
}

#[test]
fn test_member_invited_by_delta_member_accepted() {
    let room = TestRoom::new();
    let local = room.base();
    let delta = RoomDelta::new().with(ComponentDelta::Members(vec![
        AuthorizedMember::invite(id(2), &super::test_utils::key(1)).unwrap(),
        AuthorizedMember::invite(id(1), &room.owner).unwrap(),
    ]));
    let applied = apply(&room.params, &local, &delta).unwrap();
    assert!(applied.is_effective_member(&room.params, &id(2)));
}

#[test]
fn test_message_from_unknown_author_rejects_whole_delta() {
    let room = TestRoom::new();
    let local = room.invite(&room.base(), 0, 1);
    let good = room.post(&local, 1, "ok");
    let outsider = room.post(&local, 5, "let me in");

    let mut delta = RoomDelta::from_state(&good);
    delta.push(ComponentDelta::Messages(outsider.messages.values().cloned().collect()));

    assert!(matches!(
        apply(&room.params, &local, &delta),
        Err(Rejected::Invalid(_))
    ));
}

#[test]
fn test_delta_for_banned_members_messages_dropped_silently() {
    let room = TestRoom::new();
    let with_member = room.invite(&room.base(), 0, 1);
    let local = room.ban(&with_member, 1);
    let remote = room.post(&with_member, 1, "too late");

    let delta = delta_from(&room.params, &remote, &summarize(&room.params, &local)).unwrap();
    let applied = apply(&room.params, &local, &delta).unwrap();
    assert_eq!(applied, local);
}

#[test]
fn test_full_sync_from_empty() {
    let room = TestRoom::new();
    let state = room.nickname(&room.post(&room.invite(&room.base(), 0, 1), 1, "hi"), 1, 3, "al");
    let delta = delta_from(&room.params, &state, &summarize(&room.params, &RoomState::default()))
        .unwrap();
    assert_eq!(apply(&room.params, &RoomState::default(), &delta).unwrap(), state);
}
