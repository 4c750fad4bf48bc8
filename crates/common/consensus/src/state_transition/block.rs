use alloy_primitives::B256;
use anyhow::anyhow;
use ethereum_hashing::hash;
use tree_hash::TreeHash;

use crate::{
    beacon_block_header::BeaconBlockHeader,
    constants::{
        DOMAIN_RANDAO, EPOCHS_PER_ETH1_VOTING_PERIOD, EPOCHS_PER_HISTORICAL_VECTOR, MAX_DEPOSITS,
        SLOTS_PER_EPOCH,
    },
    misc::{compute_signing_root, xor},
    phase0::{
        beacon_block::BeaconBlock, beacon_block_body::BeaconBlockBody, beacon_state::BeaconState,
    },
    state_transition::{
        epochs_context::EpochsContext,
        errors::ValidationError,
        operations::{
            process_attestation, process_attester_slashing, process_deposit,
            process_proposer_slashing, process_voluntary_exit,
        },
    },
};
use lumen_bls::traits::Verifiable;

pub fn process_block_header(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    block: &BeaconBlock,
) -> anyhow::Result<()> {
    // Verify that the slots match
    if block.slot != state.slot {
        return Err(ValidationError::BadSlot {
            block: block.slot,
            state: state.slot,
        }
        .into());
    }
    // Verify that the block is newer than the latest block header
    if block.slot <= state.latest_block_header.slot {
        return Err(ValidationError::BlockNotNewer {
            block: block.slot,
            latest: state.latest_block_header.slot,
        }
        .into());
    }
    // Verify that proposer index is the correct index
    let proposer_index = epochs_context.get_beacon_proposer(state.slot)?;
    if block.proposer_index != proposer_index {
        return Err(ValidationError::BadProposer {
            expected: proposer_index,
            actual: block.proposer_index,
        }
        .into());
    }
    // Verify that the parent matches
    let expected_parent_root = state.latest_block_header.tree_hash_root();
    if block.parent_root != expected_parent_root {
        return Err(ValidationError::BadParentRoot {
            expected: expected_parent_root,
            actual: block.parent_root,
        }
        .into());
    }

    // Cache current block as the new latest block
    state.latest_block_header = BeaconBlockHeader {
        slot: block.slot,
        proposer_index: block.proposer_index,
        parent_root: block.parent_root,
        state_root: B256::default(), // Overwritten in the next process_slot call
        body_root: block.body.tree_hash_root(),
    };

    // Verify proposer is not slashed
    let proposer = state
        .validators
        .get(proposer_index as usize)
        .ok_or(ValidationError::UnknownValidator {
            index: proposer_index,
        })?;
    if proposer.slashed {
        return Err(ValidationError::ProposerSlashed {
            index: proposer_index,
        }
        .into());
    }

    Ok(())
}

pub fn process_randao(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    body: &BeaconBlockBody,
) -> anyhow::Result<()> {
    let epoch = epochs_context.current_shuffling.epoch;

    // Verify RANDAO reveal
    let proposer_index = epochs_context.get_beacon_proposer(state.slot)?;
    let proposer = state
        .validators
        .get(proposer_index as usize)
        .ok_or(ValidationError::UnknownValidator {
            index: proposer_index,
        })?;
    let signing_root = compute_signing_root(&epoch, state.get_domain(DOMAIN_RANDAO, Some(epoch)));
    if !body
        .randao_reveal
        .verify(&proposer.public_key, signing_root.as_ref())
        .map_err(|err| anyhow!("randao reveal verification failed: {err:?}"))?
    {
        return Err(ValidationError::BadSignature {
            context: "randao reveal",
        }
        .into());
    }

    // Mix in RANDAO reveal
    let mix = xor(
        state.get_randao_mix(epoch).as_slice(),
        hash(body.randao_reveal.to_bytes()).as_slice(),
    );
    state.randao_mixes[(epoch % EPOCHS_PER_HISTORICAL_VECTOR) as usize] = mix;

    Ok(())
}

pub fn process_eth1_data(state: &mut BeaconState, body: &BeaconBlockBody) -> anyhow::Result<()> {
    state
        .eth1_data_votes
        .push(body.eth1_data.clone())
        .map_err(|err| anyhow!("Can't push eth1_data vote: {err:?}"))?;

    let count = state
        .eth1_data_votes
        .iter()
        .filter(|vote| **vote == body.eth1_data)
        .count() as u64;

    if count * 2 > EPOCHS_PER_ETH1_VOTING_PERIOD * SLOTS_PER_EPOCH {
        state.eth1_data = body.eth1_data.clone();
    }

    Ok(())
}

pub fn process_operations(
    epochs_context: &mut EpochsContext,
    state: &mut BeaconState,
    body: &BeaconBlockBody,
) -> anyhow::Result<()> {
    // Verify that outstanding deposits are processed up to the maximum number of deposits
    let expected_deposits = std::cmp::min(
        MAX_DEPOSITS,
        state.eth1_data.deposit_count - state.eth1_deposit_index,
    );
    if body.deposits.len() as u64 != expected_deposits {
        return Err(ValidationError::DepositCountMismatch {
            expected: expected_deposits,
            actual: body.deposits.len() as u64,
        }
        .into());
    }

    for proposer_slashing in body.proposer_slashings.iter() {
        process_proposer_slashing(epochs_context, state, proposer_slashing)?;
    }
    for attester_slashing in body.attester_slashings.iter() {
        process_attester_slashing(epochs_context, state, attester_slashing)?;
    }
    for attestation in body.attestations.iter() {
        process_attestation(epochs_context, state, attestation)?;
    }
    for deposit in body.deposits.iter() {
        process_deposit(epochs_context, state, deposit)?;
    }
    for voluntary_exit in body.voluntary_exits.iter() {
        process_voluntary_exit(epochs_context, state, voluntary_exit)?;
    }

    Ok(())
}
