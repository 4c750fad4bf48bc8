pub mod block;
pub mod epoch;
pub mod epoch_process;
pub mod epochs_context;
pub mod errors;
pub mod operations;

use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use tracing::debug;
use tree_hash::TreeHash;

use crate::{
    constants::{DOMAIN_BEACON_PROPOSER, SLOTS_PER_EPOCH, SLOTS_PER_HISTORICAL_ROOT},
    misc::compute_signing_root,
    phase0::{
        beacon_block::{BeaconBlock, SignedBeaconBlock},
        beacon_state::BeaconState,
    },
};
use lumen_bls::traits::Verifiable;

pub use block::{process_block_header, process_eth1_data, process_operations, process_randao};
pub use epoch::{
    process_final_updates, process_justification_and_finalization, process_registry_updates,
    process_rewards_and_penalties, process_slashings,
};
pub use epoch_process::{EpochProcess, prepare_epoch_process};
pub use epochs_context::{EpochsContext, ShufflingEpoch};
pub use errors::ValidationError;

/// Cache the state and block roots of the slot about to be left behind.
pub fn process_slot(state: &mut BeaconState) -> anyhow::Result<()> {
    // Cache state root
    let previous_state_root = state.tree_hash_root();
    state.state_roots[(state.slot % SLOTS_PER_HISTORICAL_ROOT) as usize] = previous_state_root;
    // Cache latest block header state root
    if state.latest_block_header.state_root == B256::default() {
        state.latest_block_header.state_root = previous_state_root;
    }
    // Cache block root
    let previous_block_root = state.latest_block_header.tree_hash_root();
    state.block_roots[(state.slot % SLOTS_PER_HISTORICAL_ROOT) as usize] = previous_block_root;

    Ok(())
}

/// Run the epoch transition for the epoch the state currently sits in: prepare the work
/// list, then justify/finalize, apply rewards and penalties, update the registry, finalize
/// slashings and run the final housekeeping, strictly in that order.
pub fn process_epoch(epochs_context: &EpochsContext, state: &mut BeaconState) -> anyhow::Result<()> {
    let process = prepare_epoch_process(epochs_context, state)?;
    epoch::process_justification_and_finalization(&process, state)?;
    epoch::process_rewards_and_penalties(&process, state)?;
    epoch::process_registry_updates(&process, state)?;
    epoch::process_slashings(&process, state)?;
    epoch::process_final_updates(&process, state)?;
    debug!(epoch = process.current_epoch, "processed epoch transition");
    Ok(())
}

/// Advance the state one empty slot at a time up to ``slot``, running the epoch transition
/// and rotating the shuffling cache at every epoch boundary on the way.
pub fn process_slots(
    epochs_context: &mut EpochsContext,
    state: &mut BeaconState,
    slot: u64,
) -> anyhow::Result<()> {
    ensure!(
        state.slot < slot,
        "requested a slot transition at {slot}, behind the current slot {}",
        state.slot
    );

    while state.slot < slot {
        process_slot(state)?;
        // Process epoch on the start slot of the next epoch
        if (state.slot + 1) % SLOTS_PER_EPOCH == 0 {
            process_epoch(epochs_context, state)?;
            state.slot += 1;
            epochs_context.rotate_epochs(state)?;
        } else {
            state.slot += 1;
        }
    }

    Ok(())
}

/// Apply ``block`` to the state: header, RANDAO, eth1 vote, then the operations in body
/// order. The state must already sit at the block's slot.
pub fn process_block(
    epochs_context: &mut EpochsContext,
    state: &mut BeaconState,
    block: &BeaconBlock,
) -> anyhow::Result<()> {
    block::process_block_header(epochs_context, state, block)?;
    block::process_randao(epochs_context, state, &block.body)?;
    block::process_eth1_data(state, &block.body)?;
    block::process_operations(epochs_context, state, &block.body)?;
    debug!(slot = block.slot, "processed block");
    Ok(())
}

pub fn verify_block_signature(
    epochs_context: &EpochsContext,
    state: &BeaconState,
    signed_block: &SignedBeaconBlock,
) -> anyhow::Result<()> {
    let block = &signed_block.message;
    let public_key = epochs_context
        .index_to_pubkey
        .get(block.proposer_index as usize)
        .ok_or(ValidationError::UnknownValidator {
            index: block.proposer_index,
        })?;
    let signing_root =
        compute_signing_root(block, state.get_domain(DOMAIN_BEACON_PROPOSER, None));
    if !signed_block
        .signature
        .verify(public_key, signing_root.as_ref())
        .map_err(|err| anyhow!("block signature verification failed: {err:?}"))?
    {
        return Err(ValidationError::BadSignature { context: "block" }.into());
    }
    Ok(())
}

/// Full transition: advance empty slots up to the block's slot, then apply the block.
/// With ``validate_result`` the outer block signature and the post-state root are checked
/// as well.
pub fn state_transition(
    epochs_context: &mut EpochsContext,
    state: &mut BeaconState,
    signed_block: &SignedBeaconBlock,
    validate_result: bool,
) -> anyhow::Result<()> {
    let block = &signed_block.message;

    // Process slots (including those with no blocks) since the last block
    process_slots(epochs_context, state, block.slot)?;

    if validate_result {
        verify_block_signature(epochs_context, state, signed_block)?;
    }

    process_block(epochs_context, state, block)?;

    if validate_result {
        ensure!(
            block.state_root == state.tree_hash_root(),
            "post-state root does not match the block's state root"
        );
    }

    Ok(())
}
