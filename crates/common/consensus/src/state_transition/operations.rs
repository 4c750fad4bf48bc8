use std::collections::HashSet;

use anyhow::anyhow;
use itertools::Itertools;
use lumen_bls::traits::Verifiable;
use lumen_merkle::is_valid_merkle_branch;
use ssz_types::VariableList;
use tree_hash::TreeHash;

use crate::{
    attestation::Attestation,
    attester_slashing::AttesterSlashing,
    constants::{
        DEPOSIT_CONTRACT_TREE_DEPTH, DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER,
        DOMAIN_DEPOSIT, DOMAIN_VOLUNTARY_EXIT, EFFECTIVE_BALANCE_INCREMENT,
        EPOCHS_PER_SLASHINGS_VECTOR, FAR_FUTURE_EPOCH, GENESIS_FORK_VERSION,
        MAX_EFFECTIVE_BALANCE, MIN_ATTESTATION_INCLUSION_DELAY, MIN_SLASHING_PENALTY_QUOTIENT,
        MIN_VALIDATOR_WITHDRAWABILITY_DELAY, PROPOSER_REWARD_QUOTIENT, SHARD_COMMITTEE_PERIOD,
        SLOTS_PER_EPOCH, WHISTLEBLOWER_REWARD_QUOTIENT,
    },
    deposit::Deposit,
    deposit_message::DepositMessage,
    indexed_attestation::IndexedAttestation,
    misc::{
        compute_activation_exit_epoch, compute_domain, compute_epoch_at_slot,
        compute_signing_root, is_sorted_and_unique,
    },
    pending_attestation::PendingAttestation,
    phase0::beacon_state::BeaconState,
    predicates::is_slashable_attestation_data,
    proposer_slashing::ProposerSlashing,
    state_transition::{
        epoch_process::get_churn_limit, epochs_context::EpochsContext, errors::ValidationError,
    },
    validator::Validator,
    voluntary_exit::SignedVoluntaryExit,
};

/// Initiate the exit of the validator with index ``index``.
pub fn initiate_validator_exit(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    index: u64,
) -> anyhow::Result<()> {
    let validator = state
        .validators
        .get(index as usize)
        .ok_or(ValidationError::UnknownValidator { index })?;

    // Return if validator already initiated exit
    if validator.exit_epoch != FAR_FUTURE_EPOCH {
        return Ok(());
    }

    let current_epoch = epochs_context.current_shuffling.epoch;

    // Compute exit queue epoch
    let mut exit_queue_epoch = compute_activation_exit_epoch(current_epoch);
    for validator in state.validators.iter() {
        if validator.exit_epoch != FAR_FUTURE_EPOCH && validator.exit_epoch > exit_queue_epoch {
            exit_queue_epoch = validator.exit_epoch;
        }
    }
    let exit_queue_churn = state
        .validators
        .iter()
        .filter(|validator| validator.exit_epoch == exit_queue_epoch)
        .count() as u64;
    if exit_queue_churn
        >= get_churn_limit(epochs_context.current_shuffling.active_indices.len() as u64)
    {
        exit_queue_epoch += 1;
    }

    // Set validator exit epoch and withdrawable epoch
    let validator = state
        .validators
        .get_mut(index as usize)
        .ok_or(ValidationError::UnknownValidator { index })?;
    validator.exit_epoch = exit_queue_epoch;
    validator.withdrawable_epoch = exit_queue_epoch + MIN_VALIDATOR_WITHDRAWABILITY_DELAY;

    Ok(())
}

/// Slash the validator with index ``slashed_index``. The block proposer takes the
/// whistleblower reward unless another whistleblower index is given.
pub fn slash_validator(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    slashed_index: u64,
    whistleblower_index: Option<u64>,
) -> anyhow::Result<()> {
    let epoch = epochs_context.current_shuffling.epoch;

    initiate_validator_exit(epochs_context, state, slashed_index)?;

    let validator = state
        .validators
        .get_mut(slashed_index as usize)
        .ok_or(ValidationError::UnknownValidator {
            index: slashed_index,
        })?;
    validator.slashed = true;
    validator.withdrawable_epoch = std::cmp::max(
        validator.withdrawable_epoch,
        epoch + EPOCHS_PER_SLASHINGS_VECTOR,
    );
    let validator_effective_balance = validator.effective_balance;

    // Add the slashed effective balance to the slashings vector
    state.slashings[(epoch % EPOCHS_PER_SLASHINGS_VECTOR) as usize] +=
        validator_effective_balance;
    state.decrease_balance(
        slashed_index,
        validator_effective_balance / MIN_SLASHING_PENALTY_QUOTIENT,
    )?;

    // Apply proposer and whistleblower rewards
    let proposer_index = epochs_context.get_beacon_proposer(state.slot)?;
    let whistleblower_index = whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = validator_effective_balance / WHISTLEBLOWER_REWARD_QUOTIENT;
    let proposer_reward = whistleblower_reward / PROPOSER_REWARD_QUOTIENT;
    state.increase_balance(proposer_index, proposer_reward)?;
    state.increase_balance(whistleblower_index, whistleblower_reward - proposer_reward)?;

    Ok(())
}

pub fn process_proposer_slashing(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    proposer_slashing: &ProposerSlashing,
) -> anyhow::Result<()> {
    let header_1 = &proposer_slashing.signed_header_1.message;
    let header_2 = &proposer_slashing.signed_header_2.message;

    // Verify header slots match
    if header_1.slot != header_2.slot {
        return Err(ValidationError::BadSlot {
            block: header_1.slot,
            state: header_2.slot,
        }
        .into());
    }
    // Verify header proposer indices match
    if header_1.proposer_index != header_2.proposer_index {
        return Err(ValidationError::BadProposer {
            expected: header_1.proposer_index,
            actual: header_2.proposer_index,
        }
        .into());
    }
    // Verify the headers are different
    if header_1 == header_2 {
        return Err(ValidationError::NotSlashableData.into());
    }

    // Get the proposer and verify they are slashable
    let proposer_index = header_1.proposer_index;
    let proposer = state
        .validators
        .get(proposer_index as usize)
        .ok_or(ValidationError::UnknownValidator {
            index: proposer_index,
        })?;
    if !proposer.is_slashable_validator(epochs_context.current_shuffling.epoch) {
        return Err(ValidationError::NotSlashable {
            index: proposer_index,
        }
        .into());
    }

    // Verify signatures
    for signed_header in [
        &proposer_slashing.signed_header_1,
        &proposer_slashing.signed_header_2,
    ] {
        let domain = state.get_domain(
            DOMAIN_BEACON_PROPOSER,
            Some(compute_epoch_at_slot(signed_header.message.slot)),
        );
        let signing_root = compute_signing_root(&signed_header.message, domain);
        if !signed_header
            .signature
            .verify(&proposer.public_key, signing_root.as_ref())
            .map_err(|err| anyhow!("header signature verification failed: {err:?}"))?
        {
            return Err(ValidationError::BadSignature {
                context: "proposer slashing header",
            }
            .into());
        }
    }

    slash_validator(epochs_context, state, proposer_index, None)
}

/// Check if ``indexed_attestation`` is non-empty, has sorted and unique indices and has a
/// valid aggregate signature.
pub fn is_valid_indexed_attestation(
    epochs_context: &EpochsContext,
    state: &BeaconState,
    indexed_attestation: &IndexedAttestation,
) -> anyhow::Result<bool> {
    let indices: Vec<u64> = indexed_attestation.attesting_indices.iter().copied().collect();
    if indices.is_empty() || !is_sorted_and_unique(&indices) {
        return Ok(false);
    }

    let public_keys = indices
        .iter()
        .map(|&index| {
            epochs_context
                .index_to_pubkey
                .get(index as usize)
                .ok_or_else(|| anyhow!("unknown validator index {index}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let domain = state.get_domain(
        DOMAIN_BEACON_ATTESTER,
        Some(indexed_attestation.data.target.epoch),
    );
    let signing_root = compute_signing_root(&indexed_attestation.data, domain);

    indexed_attestation
        .signature
        .fast_aggregate_verify(public_keys, signing_root.as_ref())
        .map_err(|err| anyhow!("indexed attestation verification failed: {err:?}"))
}

pub fn process_attester_slashing(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    attester_slashing: &AttesterSlashing,
) -> anyhow::Result<()> {
    let attestation_1 = &attester_slashing.attestation_1;
    let attestation_2 = &attester_slashing.attestation_2;

    if !is_slashable_attestation_data(&attestation_1.data, &attestation_2.data) {
        return Err(ValidationError::NotSlashableData.into());
    }
    if !is_valid_indexed_attestation(epochs_context, state, attestation_1)? {
        return Err(ValidationError::BadSignature {
            context: "first slashing attestation",
        }
        .into());
    }
    if !is_valid_indexed_attestation(epochs_context, state, attestation_2)? {
        return Err(ValidationError::BadSignature {
            context: "second slashing attestation",
        }
        .into());
    }

    let current_epoch = epochs_context.current_shuffling.epoch;
    let indices_1: HashSet<u64> = attestation_1.attesting_indices.iter().copied().collect();
    let indices_2: HashSet<u64> = attestation_2.attesting_indices.iter().copied().collect();

    let mut slashed_any = false;
    for &index in indices_1.intersection(&indices_2).sorted() {
        let slashable = state
            .validators
            .get(index as usize)
            .ok_or(ValidationError::UnknownValidator { index })?
            .is_slashable_validator(current_epoch);
        if slashable {
            slash_validator(epochs_context, state, index, None)?;
            slashed_any = true;
        }
    }
    if !slashed_any {
        return Err(ValidationError::NoneSlashed.into());
    }

    Ok(())
}

pub fn process_attestation(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    attestation: &Attestation,
) -> anyhow::Result<()> {
    let slot = state.slot;
    let data = &attestation.data;

    let committees_per_slot = epochs_context.get_committee_count_at_slot(data.slot)?;
    if data.index >= committees_per_slot {
        return Err(ValidationError::CommitteeOutOfRange {
            index: data.index,
            committees_per_slot,
        }
        .into());
    }

    let current_epoch = epochs_context.current_shuffling.epoch;
    let previous_epoch = epochs_context.previous_shuffling.epoch;
    if data.target.epoch != current_epoch && data.target.epoch != previous_epoch {
        return Err(ValidationError::BadTargetEpoch {
            target: data.target.epoch,
        }
        .into());
    }
    if data.target.epoch != compute_epoch_at_slot(data.slot) {
        return Err(ValidationError::TargetEpochSlotMismatch {
            target: data.target.epoch,
            slot: data.slot,
        }
        .into());
    }
    if !(data.slot + MIN_ATTESTATION_INCLUSION_DELAY <= slot
        && slot <= data.slot + SLOTS_PER_EPOCH)
    {
        return Err(ValidationError::AttestationNotIncludable {
            slot: data.slot,
            state: slot,
        }
        .into());
    }

    let committee = epochs_context.get_beacon_committee(data.slot, data.index)?;
    if attestation.aggregation_bits.len() != committee.len() {
        return Err(ValidationError::AttestationBitLength {
            bits: attestation.aggregation_bits.len(),
            committee: committee.len(),
        }
        .into());
    }

    let pending_attestation = PendingAttestation {
        aggregation_bits: attestation.aggregation_bits.clone(),
        data: data.clone(),
        inclusion_delay: slot - data.slot,
        proposer_index: epochs_context.get_beacon_proposer(slot)?,
    };

    if data.target.epoch == current_epoch {
        if data.source != state.current_justified_checkpoint {
            return Err(ValidationError::BadCheckpoint {
                expected: state.current_justified_checkpoint,
                actual: data.source,
            }
            .into());
        }
        state
            .current_epoch_attestations
            .push(pending_attestation)
            .map_err(|err| anyhow!("Can't push current epoch attestation: {err:?}"))?;
    } else {
        if data.source != state.previous_justified_checkpoint {
            return Err(ValidationError::BadCheckpoint {
                expected: state.previous_justified_checkpoint,
                actual: data.source,
            }
            .into());
        }
        state
            .previous_epoch_attestations
            .push(pending_attestation)
            .map_err(|err| anyhow!("Can't push previous epoch attestation: {err:?}"))?;
    }

    // Verify the signature of the derived indexed attestation
    let mut attesting_indices = vec![];
    for (i, &validator_index) in committee.iter().enumerate() {
        if attestation
            .aggregation_bits
            .get(i)
            .map_err(|err| anyhow!("failed to get aggregation bit {i}: {err:?}"))?
        {
            attesting_indices.push(validator_index);
        }
    }
    attesting_indices.sort_unstable();
    let indexed_attestation = IndexedAttestation {
        attesting_indices: VariableList::new(attesting_indices)
            .map_err(|err| anyhow!("Couldn't build attesting indices: {err:?}"))?,
        data: data.clone(),
        signature: attestation.signature.clone(),
    };
    if !is_valid_indexed_attestation(epochs_context, state, &indexed_attestation)? {
        return Err(ValidationError::BadSignature {
            context: "attestation",
        }
        .into());
    }

    Ok(())
}

pub fn process_deposit(
    epochs_context: &mut EpochsContext,
    state: &mut BeaconState,
    deposit: &Deposit,
) -> anyhow::Result<()> {
    // Verify the Merkle branch
    if !is_valid_merkle_branch(
        deposit.data.tree_hash_root(),
        &deposit.proof,
        // Add 1 for the list length mix-in
        DEPOSIT_CONTRACT_TREE_DEPTH + 1,
        state.eth1_deposit_index,
        state.eth1_data.deposit_root,
    ) {
        return Err(ValidationError::BadDepositProof {
            index: state.eth1_deposit_index,
        }
        .into());
    }

    // Deposits must be processed in order
    state.eth1_deposit_index += 1;

    let public_key = &deposit.data.public_key;
    let amount = deposit.data.amount;
    if let Some(&index) = epochs_context.pubkey_to_index.get(public_key) {
        // Top up the existing validator
        state.increase_balance(index, amount)?;
    } else {
        // Verify the deposit signature (proof of possession) which is not checked by the
        // deposit contract. An invalid signature consumes the deposit without creating a
        // validator; it is not a block error.
        let deposit_message = DepositMessage {
            public_key: public_key.clone(),
            withdrawal_credentials: deposit.data.withdrawal_credentials,
            amount,
        };
        // Fork-agnostic domain since deposits are valid across forks
        let domain = compute_domain(DOMAIN_DEPOSIT, Some(GENESIS_FORK_VERSION), None);
        let signing_root = compute_signing_root(&deposit_message, domain);
        if !deposit
            .data
            .signature
            .verify(public_key, signing_root.as_ref())
            .unwrap_or(false)
        {
            return Ok(());
        }

        // Add validator and balance entries
        state
            .validators
            .push(Validator {
                public_key: public_key.clone(),
                withdrawal_credentials: deposit.data.withdrawal_credentials,
                effective_balance: std::cmp::min(
                    amount - amount % EFFECTIVE_BALANCE_INCREMENT,
                    MAX_EFFECTIVE_BALANCE,
                ),
                slashed: false,
                activation_eligibility_epoch: FAR_FUTURE_EPOCH,
                activation_epoch: FAR_FUTURE_EPOCH,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
            })
            .map_err(|err| anyhow!("Couldn't push to validators: {err:?}"))?;
        state
            .balances
            .push(amount)
            .map_err(|err| anyhow!("Couldn't push to balances: {err:?}"))?;
    }

    // Now that there may be a new validator, update the epoch context with the new pubkey
    epochs_context.sync_pubkeys(state)?;

    Ok(())
}

pub fn process_voluntary_exit(
    epochs_context: &EpochsContext,
    state: &mut BeaconState,
    signed_voluntary_exit: &SignedVoluntaryExit,
) -> anyhow::Result<()> {
    let voluntary_exit = &signed_voluntary_exit.message;
    let index = voluntary_exit.validator_index;
    let current_epoch = epochs_context.current_shuffling.epoch;

    let validator = state
        .validators
        .get(index as usize)
        .ok_or(ValidationError::UnknownValidator { index })?;

    // Verify the validator is active
    if !validator.is_active_validator(current_epoch) {
        return Err(ValidationError::ValidatorNotActive { index }.into());
    }
    // Verify exit has not been initiated
    if validator.exit_epoch != FAR_FUTURE_EPOCH {
        return Err(ValidationError::AlreadyExited { index }.into());
    }
    // Exits must specify an epoch when they become valid; they are not valid before then
    if current_epoch < voluntary_exit.epoch {
        return Err(ValidationError::ExitNotDue {
            epoch: voluntary_exit.epoch,
            current: current_epoch,
        }
        .into());
    }
    // Verify the validator has been active long enough
    if current_epoch < validator.activation_epoch + SHARD_COMMITTEE_PERIOD {
        return Err(ValidationError::TooYoungToExit { index }.into());
    }

    // Verify signature
    let domain = state.get_domain(DOMAIN_VOLUNTARY_EXIT, Some(voluntary_exit.epoch));
    let signing_root = compute_signing_root(voluntary_exit, domain);
    if !signed_voluntary_exit
        .signature
        .verify(&validator.public_key, signing_root.as_ref())
        .map_err(|err| anyhow!("voluntary exit verification failed: {err:?}"))?
    {
        return Err(ValidationError::BadSignature {
            context: "voluntary exit",
        }
        .into());
    }

    // Initiate exit
    initiate_validator_exit(epochs_context, state, index)
}
