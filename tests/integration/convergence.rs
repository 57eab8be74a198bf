//! Convergence scenarios across independently updated replicas

use super::test_utils::{id, TestRoom};
use concord::merge::merge;
use concord::summary::summarize;
use concord::validate::{validate_local, validate, RelatedStates, Validation};

#[test]
fn test_concurrent_member_adds_both_survive() {
    let room = TestRoom::new();
    let base = room.base();
    let p1 = room.invite(&base, 0, 1);
    let p2 = room.invite(&base, 0, 2);

    let forward = merge(&room.params, &p1, &p2);
    let backward = merge(&room.params, &p2, &p1);

    assert_eq!(forward, backward);
    assert!(forward.has_member(&id(1)));
    assert!(forward.has_member(&id(2)));
    assert_eq!(
        validate(&room.params, &forward, &RelatedStates::new()),
        Validation::Valid
    );
}

#[test]
fn test_equal_version_configuration_same_winner_everywhere() {
    let room = TestRoom::new();
    let base = room.base();
    let red = room.rename(&base, 2, "red");
    let blue = room.rename(&base, 2, "blue");
    let chatty = room.post(&room.invite(&base, 0, 1), 1, "hello");

    let orders = [
        merge(&room.params, &merge(&room.params, &red, &blue), &chatty),
        merge(&room.params, &merge(&room.params, &blue, &chatty), &red),
        merge(&room.params, &chatty, &merge(&room.params, &red, &blue)),
        merge(&room.params, &merge(&room.params, &chatty, &red), &blue),
    ];
    for state in &orders[1..] {
        assert_eq!(state.configuration, orders[0].configuration);
        assert_eq!(state, &orders[0]);
    }

    let red_sig = red.configuration.as_ref().unwrap().signature;
    let blue_sig = blue.configuration.as_ref().unwrap().signature;
    let expected = if red_sig > blue_sig { "red" } else { "blue" };
    assert_eq!(
        orders[0].configuration.as_ref().unwrap().configuration.name,
        expected
    );
}

#[test]
fn test_ban_is_not_undone_by_stale_replica() {
    let room = TestRoom::new();
    let with_member = room.post(&room.invite(&room.base(), 0, 1), 1, "first");
    let banned = room.ban(&with_member, 1);
    let stale_with_more = room.post(&with_member, 1, "second");

    let merged = merge(&room.params, &banned, &stale_with_more);
    assert!(merged.has_member(&id(1)));
    assert!(!merged.is_effective_member(&room.params, &id(1)));
    assert!(merged.messages.is_empty());
    assert!(validate_local(&room.params, &merged).is_ok());
}

#[test]
fn test_invitees_of_banned_member_stay() {
    let room = TestRoom::new();
    let chain = room.invite(&room.invite(&room.base(), 0, 1), 1, 2);
    let with_post = room.post(&chain, 2, "still here");
    let banned = room.ban(&chain, 1);

    let merged = merge(&room.params, &with_post, &banned);
    assert!(!merged.is_effective_member(&room.params, &id(1)));
    assert!(merged.is_effective_member(&room.params, &id(2)));
    assert_eq!(merged.messages.len(), 1);
}

#[test]
fn test_lamport_times_order_replies_after_seen_messages() {
    let room = TestRoom::new();
    let members = room.invite(&room.invite(&room.base(), 0, 1), 0, 2);
    let first = room.post(&members, 1, "question");
    let reply = room.post(&first, 2, "answer");

    let merged = merge(&room.params, &first, &reply);
    let contents: Vec<_> = merged
        .messages
        .values()
        .map(|m| m.message.content.as_str())
        .collect();
    assert_eq!(contents, vec!["question", "answer"]);
}

#[test]
fn test_summary_identical_after_convergence() {
    let room = TestRoom::new();
    let base = room.base();
    let a = room.nickname(&room.invite(&base, 0, 1), 1, 1, "ann");
    let b = room.post(&room.invite(&base, 0, 2), 2, "hey");

    let ab = merge(&room.params, &a, &b);
    let ba = merge(&room.params, &b, &a);
    assert_eq!(summarize(&room.params, &ab), summarize(&room.params, &ba));
}
