mod common;

use common::{build_block, genesis_with_keys, sign_block};
use lumen_consensus::{
    constants::{MAX_EFFECTIVE_BALANCE, SLOTS_PER_EPOCH},
    state_transition::{EpochsContext, process_block, process_slots, state_transition},
};
use tree_hash::TreeHash;

#[test]
fn test_empty_epoch_advance_from_genesis() {
    let (mut state, _keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, SLOTS_PER_EPOCH).expect("empty epoch advance");

    assert_eq!(state.slot, SLOTS_PER_EPOCH);
    assert_eq!(context.current_shuffling.epoch, 1);
    assert_eq!(context.previous_shuffling.epoch, 0);
    assert_eq!(context.next_shuffling.epoch, 2);

    // Nothing was justified or finalized, and no balance moved.
    assert!(state.justification_bits.iter().all(|bit| !bit));
    assert_eq!(state.finalized_checkpoint.epoch, 0);
    for balance in state.balances.iter() {
        assert_eq!(*balance, MAX_EFFECTIVE_BALANCE);
    }
}

#[test]
fn test_process_slots_rejects_past_slots() {
    let (mut state, _keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, 5).expect("advance");
    assert!(process_slots(&mut context, &mut state, 5).is_err());
    assert!(process_slots(&mut context, &mut state, 3).is_err());
}

#[test]
fn test_epoch_boundary_count_matches_slots_crossed() {
    let (mut state, _keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    // Two epoch boundaries are crossed between slot 0 and slot 2 * SLOTS_PER_EPOCH + 3.
    process_slots(&mut context, &mut state, 2 * SLOTS_PER_EPOCH + 3).expect("advance");
    assert_eq!(context.current_shuffling.epoch, 2);
    assert_eq!(state.get_current_epoch(), 2);
}

#[test]
fn test_apply_empty_block() {
    let (mut state, keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, 1).expect("advance");
    let block = build_block(&context, &state, &keys, 1);
    process_block(&mut context, &mut state, &block).expect("block applies");

    assert_eq!(state.latest_block_header.slot, 1);
    assert_eq!(state.latest_block_header.proposer_index, block.proposer_index);
    assert_eq!(state.eth1_data_votes.len(), 1);
}

#[test]
fn test_signed_block_round_trip_with_state_root() {
    let (mut state, keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    // Dry-run the transition on a copy to learn the post-state root, as a proposer would.
    let mut dry_state = state.clone();
    let mut dry_context = context.clone();
    process_slots(&mut dry_context, &mut dry_state, 1).expect("advance");
    let mut block = build_block(&dry_context, &dry_state, &keys, 1);
    process_block(&mut dry_context, &mut dry_state, &block).expect("block applies");
    block.state_root = dry_state.tree_hash_root();

    let signed_block = sign_block(&state, &keys, block);
    state_transition(&mut context, &mut state, &signed_block, true)
        .expect("full transition verifies");

    assert_eq!(state, dry_state);
}

#[test]
fn test_block_transition_is_deterministic() {
    let (base_state, keys) = genesis_with_keys(16);
    let base_context = EpochsContext::load_state(&base_state).expect("context loads");

    let run = || {
        let mut state = base_state.clone();
        let mut context = base_context.clone();
        process_slots(&mut context, &mut state, 1).expect("advance");
        let block = build_block(&context, &state, &keys, 1);
        process_block(&mut context, &mut state, &block).expect("block applies");
        (state, context.index_to_pubkey.clone())
    };

    let (state_a, pubkeys_a) = run();
    let (state_b, pubkeys_b) = run();
    assert_eq!(state_a, state_b);
    assert_eq!(pubkeys_a, pubkeys_b);
}

#[test]
fn test_wrong_proposer_is_rejected() {
    let (mut state, keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, 1).expect("advance");
    let mut block = build_block(&context, &state, &keys, 1);
    block.proposer_index = (block.proposer_index + 1) % 16;

    assert!(process_block(&mut context, &mut state, &block).is_err());
}

#[test]
fn test_wrong_parent_root_is_rejected() {
    let (mut state, keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, 1).expect("advance");
    let mut block = build_block(&context, &state, &keys, 1);
    block.parent_root = alloy_primitives::B256::from_slice(&[0xbe; 32]);

    assert!(process_block(&mut context, &mut state, &block).is_err());
}
