//! The room contract driven purely through opaque byte buffers

use super::test_utils::{decode, encode, id, TestRoom};
use concord::codec;
use concord::contract::{instance_id, ContractInterface, RoomContract, UpdateData, UpdateOutcome};
use concord::room::{MemberRegistry, RoomParameters};
use concord::{ContractError, ContractInstanceId, Rejected, RelatedStates, State, StateSummary, Validation};

#[test]
fn test_update_loop_with_registry() {
    let registry_id = ContractInstanceId([7u8; 32]);
    let mut room = TestRoom::new();
    room.params = room.params.clone().with_registry(registry_id);
    let contract = RoomContract::new();
    let parameters = room.parameters();
    let base = encode(&room.base());

    let invited = room.invite(&room.base(), 0, 1);
    let delta = contract
        .get_state_delta(&parameters, &encode(&invited), &contract.summarize_state(&parameters, &base).unwrap())
        .unwrap()
        .unwrap();

    let first = contract
        .update_state(&parameters, &base, vec![UpdateData::Delta(delta.clone())])
        .unwrap();
    assert_eq!(first, UpdateOutcome::NeedsRelated(vec![registry_id]));

    let mut registry = MemberRegistry::default();
    registry.allowed.insert(id(1));
    let second = contract
        .update_state(
            &parameters,
            &base,
            vec![
                UpdateData::Delta(delta),
                UpdateData::RelatedState {
                    related_to: registry_id,
                    state: codec::encode_registry(&registry).unwrap(),
                },
            ],
        )
        .unwrap();
    match second {
        UpdateOutcome::Updated(state) => assert_eq!(decode(&state), invited),
        other => panic!("expected update, got {:?}", other),
    }
}

#[test]
fn test_registry_excluding_member_is_invalid() {
    let registry_id = ContractInstanceId([7u8; 32]);
    let mut room = TestRoom::new();
    room.params = room.params.clone().with_registry(registry_id);
    let contract = RoomContract::new();
    let invited = encode(&room.invite(&room.base(), 0, 1));

    let mut related = RelatedStates::new();
    related.insert(
        registry_id,
        codec::encode_registry(&MemberRegistry::default()).unwrap(),
    );
    let verdict = contract
        .validate_state(&room.parameters(), &invited, &related)
        .unwrap();
    assert!(matches!(verdict, Validation::Invalid(_)));

    related.insert(registry_id, State::new(vec![1, 2, 3]));
    let verdict = contract
        .validate_state(&room.parameters(), &invited, &related)
        .unwrap();
    assert!(matches!(verdict, Validation::Invalid(_)));
}

#[test]
fn test_merge_states_is_order_independent() {
    let room = TestRoom::new();
    let contract = RoomContract::new();
    let parameters = room.parameters();
    let a = encode(&room.post(&room.invite(&room.base(), 0, 1), 1, "from a"));
    let b = encode(&room.rename(&room.invite(&room.base(), 0, 2), 3, "renamed"));

    let ab = contract.merge_states(&parameters, &a, &b).unwrap();
    let ba = contract.merge_states(&parameters, &b, &a).unwrap();
    assert_eq!(ab, ba);
    assert!(contract
        .validate_state(&parameters, &ab, &RelatedStates::new())
        .unwrap()
        .is_valid());
}

#[test]
fn test_up_to_date_summary_yields_no_delta() {
    let room = TestRoom::new();
    let contract = RoomContract::new();
    let parameters = room.parameters();
    let state = encode(&room.nickname(&room.invite(&room.base(), 0, 1), 1, 1, "one"));
    let summary = contract.summarize_state(&parameters, &state).unwrap();

    assert!(summary.len() < state.len());
    assert_eq!(
        contract.get_state_delta(&parameters, &state, &summary).unwrap(),
        None
    );
}

#[test]
fn test_empty_summary_yields_full_state() {
    let room = TestRoom::new();
    let contract = RoomContract::new();
    let parameters = room.parameters();
    let state = encode(&room.post(&room.invite(&room.base(), 0, 1), 1, "hello"));
    let empty = contract
        .summarize_state(&parameters, &encode(&Default::default()))
        .unwrap();

    let delta = contract
        .get_state_delta(&parameters, &state, &empty)
        .unwrap()
        .unwrap();
    let rebuilt = contract
        .apply_delta(&parameters, &encode(&Default::default()), &delta)
        .unwrap();
    assert_eq!(rebuilt, state);
}

#[test]
fn test_garbage_summary_is_invalid() {
    let room = TestRoom::new();
    let contract = RoomContract::new();
    let result = contract.get_state_delta(
        &room.parameters(),
        &encode(&room.base()),
        &StateSummary::new(vec![0xff; 3]),
    );
    assert!(matches!(result, Err(ContractError::Invalid(_))));
}

#[test]
fn test_unknown_component_rejects_delta() {
    let room = TestRoom::new();
    let contract = RoomContract::new();
    let delta = codec::encode_raw_delta(vec![(99, vec![0u8; 4])]).unwrap();
    let result = contract.apply_delta(&room.parameters(), &encode(&room.base()), &delta);
    assert!(matches!(
        result,
        Err(ContractError::Rejected(Rejected::UnknownComponent(99)))
    ));
}

#[test]
fn test_update_rejects_invalid_full_state() {
    let room = TestRoom::new();
    let contract = RoomContract::new();
    let mut forged = room.invite(&room.base(), 0, 1);
    let stolen = forged.invites_of(&id(1)).next().cloned().unwrap();
    forged.members.clear();
    let wrong_key = concord::room::Member {
        id: id(2),
        invited_by: stolen.invited_by(),
    };
    forged.members.insert(wrong_key, stolen);

    let result = contract.update_state(
        &room.parameters(),
        &encode(&room.base()),
        vec![UpdateData::State(encode(&forged))],
    );
    assert!(matches!(result, Err(ContractError::Invalid(_))));
}

#[test]
fn test_key_is_stable_per_parameters() {
    let contract = RoomContract::new();
    let room = TestRoom::new();
    let other = codec::encode_parameters(&RoomParameters::new(id(3))).unwrap();

    let key = contract.key(&room.parameters());
    assert_eq!(key, contract.key(&room.parameters()));
    assert_eq!(key.instance, instance_id(&contract.code_hash(), &room.parameters()));
    assert_ne!(key.instance, contract.key(&other).instance);
}
