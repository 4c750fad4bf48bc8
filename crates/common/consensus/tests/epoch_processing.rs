mod common;

use alloy_primitives::B256;
use common::genesis_with_keys;
use lumen_bls::PublicKey;
use lumen_consensus::{
    attestation_data::AttestationData,
    checkpoint::Checkpoint,
    constants::{
        EJECTION_BALANCE, EPOCHS_PER_SLASHINGS_VECTOR, FAR_FUTURE_EPOCH, MAX_EFFECTIVE_BALANCE,
        MIN_PER_EPOCH_CHURN_LIMIT, MIN_VALIDATOR_WITHDRAWABILITY_DELAY, SLOTS_PER_EPOCH,
    },
    misc::compute_activation_exit_epoch,
    pending_attestation::PendingAttestation,
    state_transition::{EpochsContext, epoch_process::get_churn_limit, process_slots},
    validator::Validator,
};
use ssz_types::{BitList, typenum::U2048};

#[test]
fn test_full_previous_epoch_attestations_justify() {
    let (mut state, _keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    // Sit in the last slot of epoch 2 so that epoch 1 is the previous epoch.
    process_slots(&mut context, &mut state, 3 * SLOTS_PER_EPOCH - 1).expect("advance");

    let target_root = state.get_block_root(1).expect("target root");
    for slot in SLOTS_PER_EPOCH..2 * SLOTS_PER_EPOCH {
        let committees_per_slot = context
            .get_committee_count_at_slot(slot)
            .expect("slot in window");
        for index in 0..committees_per_slot {
            let committee = context
                .get_beacon_committee(slot, index)
                .expect("committee")
                .to_vec();
            let mut aggregation_bits =
                BitList::<U2048>::with_capacity(committee.len()).expect("bitlist");
            for i in 0..committee.len() {
                aggregation_bits.set(i, true).expect("bit in range");
            }
            state
                .previous_epoch_attestations
                .push(PendingAttestation {
                    aggregation_bits,
                    data: AttestationData {
                        slot,
                        index,
                        beacon_block_root: state
                            .get_block_root_at_slot(slot)
                            .expect("head root"),
                        source: state.previous_justified_checkpoint,
                        target: Checkpoint {
                            epoch: 1,
                            root: target_root,
                        },
                    },
                    inclusion_delay: 1,
                    proposer_index: 0,
                })
                .expect("attestation fits");
        }
    }

    // Cross into epoch 3, running the epoch-2 transition with the injected votes.
    process_slots(&mut context, &mut state, 3 * SLOTS_PER_EPOCH).expect("advance");

    assert!(state.justification_bits.get(1).expect("bit 1"));
    assert_eq!(state.current_justified_checkpoint.epoch, 1);
    assert_eq!(state.current_justified_checkpoint.root, target_root);
    // A single new justification is not enough to finalize anything.
    assert_eq!(state.finalized_checkpoint.epoch, 0);
}

#[test]
fn test_inactivity_leak_accelerates_when_finality_stalls() {
    let (mut state, _keys) = genesis_with_keys(16);
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    let mut previous_balance = state.balances[0];
    let mut per_epoch_losses = vec![];
    for epoch in 1..=8 {
        process_slots(&mut context, &mut state, epoch * SLOTS_PER_EPOCH).expect("advance");
        let balance = state.balances[0];
        per_epoch_losses.push(previous_balance - balance);
        previous_balance = balance;
    }

    // The genesis-epoch transition moves no balances.
    assert_eq!(per_epoch_losses[0], 0);
    // From then on idle validators bleed every epoch.
    assert!(per_epoch_losses[1..].iter().all(|&loss| loss > 0));
    // Once the finality delay crosses the inactivity threshold, the quadratic leak makes
    // each epoch more expensive than the flat penalties before it.
    assert!(per_epoch_losses.last().expect("epochs ran") > &per_epoch_losses[1]);
    assert!(state.balances[0] < MAX_EFFECTIVE_BALANCE);
}

#[test]
fn test_activation_eligibility_waits_for_finality() {
    let (mut state, _keys) = genesis_with_keys(16);
    state
        .validators
        .push(Validator {
            public_key: PublicKey::default(),
            withdrawal_credentials: B256::ZERO,
            effective_balance: MAX_EFFECTIVE_BALANCE,
            slashed: false,
            activation_eligibility_epoch: FAR_FUTURE_EPOCH,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        })
        .expect("validator fits");
    state.balances.push(MAX_EFFECTIVE_BALANCE).expect("balance fits");
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    // The first epoch transition records the eligibility.
    process_slots(&mut context, &mut state, SLOTS_PER_EPOCH).expect("advance");
    assert_eq!(state.validators[16].activation_eligibility_epoch, 1);
    assert_eq!(state.validators[16].activation_epoch, FAR_FUTURE_EPOCH);

    // Without finality past the eligibility epoch the validator stays queued.
    process_slots(&mut context, &mut state, 2 * SLOTS_PER_EPOCH).expect("advance");
    assert_eq!(state.validators[16].activation_epoch, FAR_FUTURE_EPOCH);
}

#[test]
fn test_low_balance_validator_is_ejected() {
    let (mut state, _keys) = genesis_with_keys(16);
    state.validators[5].effective_balance = EJECTION_BALANCE;
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, SLOTS_PER_EPOCH).expect("advance");

    let ejected = &state.validators[5];
    let expected_exit = compute_activation_exit_epoch(0);
    assert_eq!(ejected.exit_epoch, expected_exit);
    assert_eq!(
        ejected.withdrawable_epoch,
        expected_exit + MIN_VALIDATOR_WITHDRAWABILITY_DELAY
    );
}

#[test]
fn test_slashing_penalty_is_finalized_mid_withdrawal_period() {
    let (mut state, _keys) = genesis_with_keys(16);
    // A validator slashed earlier, now exactly half a slashings vector away from
    // becoming withdrawable.
    state.validators[2].slashed = true;
    state.validators[2].withdrawable_epoch = EPOCHS_PER_SLASHINGS_VECTOR / 2;
    state.slashings[0] = MAX_EFFECTIVE_BALANCE;
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, SLOTS_PER_EPOCH).expect("advance");

    // slashings_scale = min(3 * 32 ETH, 512 ETH) = 96 ETH, so the penalty is
    // 32 * 96 / 512 increments = 6 ETH.
    assert_eq!(state.balances[2], MAX_EFFECTIVE_BALANCE - 6_000_000_000);
}

#[test]
fn test_effective_balance_hysteresis_tracks_balance_drop() {
    let (mut state, _keys) = genesis_with_keys(16);
    state.balances[3] = 20_000_000_000;
    let mut context = EpochsContext::load_state(&state).expect("context loads");

    process_slots(&mut context, &mut state, SLOTS_PER_EPOCH).expect("advance");

    assert_eq!(state.validators[3].effective_balance, 20_000_000_000);
    // A balance within the hysteresis band leaves the effective balance untouched.
    assert_eq!(state.validators[0].effective_balance, MAX_EFFECTIVE_BALANCE);
}

#[test]
fn test_churn_limit_has_a_floor() {
    assert_eq!(get_churn_limit(0), MIN_PER_EPOCH_CHURN_LIMIT);
    assert_eq!(get_churn_limit(100), MIN_PER_EPOCH_CHURN_LIMIT);
    assert_eq!(get_churn_limit(5 * 65536), 5);
}
