use anyhow::{anyhow, ensure};

use crate::{
    constants::{
        CHURN_LIMIT_QUOTIENT, EFFECTIVE_BALANCE_INCREMENT, EJECTION_BALANCE,
        EPOCHS_PER_SLASHINGS_VECTOR, FAR_FUTURE_EPOCH, MAX_EFFECTIVE_BALANCE,
        MIN_PER_EPOCH_CHURN_LIMIT,
    },
    misc::{compute_activation_exit_epoch, compute_start_slot_at_epoch},
    pending_attestation::PendingAttestation,
    phase0::beacon_state::BeaconState,
    state_transition::epochs_context::EpochsContext,
    validator::Validator,
};

pub const FLAG_PREV_SOURCE_ATTESTER: u8 = 1 << 0;
pub const FLAG_PREV_TARGET_ATTESTER: u8 = 1 << 1;
pub const FLAG_PREV_HEAD_ATTESTER: u8 = 1 << 2;
pub const FLAG_CURR_SOURCE_ATTESTER: u8 = 1 << 3;
pub const FLAG_CURR_TARGET_ATTESTER: u8 = 1 << 4;
pub const FLAG_CURR_HEAD_ATTESTER: u8 = 1 << 5;
pub const FLAG_UNSLASHED: u8 = 1 << 6;
pub const FLAG_ELIGIBLE_ATTESTER: u8 = 1 << 7;

pub fn has_markers(flags: u8, markers: u8) -> bool {
    flags & markers == markers
}

/// Return the validator churn limit for an active set of the given size.
pub fn get_churn_limit(active_validator_count: u64) -> u64 {
    std::cmp::max(
        MIN_PER_EPOCH_CHURN_LIMIT,
        active_validator_count / CHURN_LIMIT_QUOTIENT,
    )
}

/// Flat copy of a validator's balance and status epochs, read once per epoch run instead of
/// chasing the registry for every lookup.
#[derive(Debug, Clone, Copy)]
pub struct FlatValidator {
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub withdrawable_epoch: u64,
}

impl From<&Validator> for FlatValidator {
    fn from(validator: &Validator) -> Self {
        Self {
            effective_balance: validator.effective_balance,
            slashed: validator.slashed,
            activation_eligibility_epoch: validator.activation_eligibility_epoch,
            activation_epoch: validator.activation_epoch,
            exit_epoch: validator.exit_epoch,
            withdrawable_epoch: validator.withdrawable_epoch,
        }
    }
}

impl FlatValidator {
    pub fn is_active(&self, epoch: u64) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    /// Check if the validator is eligible to be placed into the activation queue.
    pub fn is_eligible_for_activation_queue(&self) -> bool {
        self.activation_eligibility_epoch == FAR_FUTURE_EPOCH
            && self.effective_balance == MAX_EFFECTIVE_BALANCE
    }
}

/// Per-validator participation record for one epoch transition.
#[derive(Debug, Clone)]
pub struct AttesterStatus {
    pub flags: u8,

    /// Proposer of the earliest inclusion of this validator's previous-epoch attestation.
    pub proposer_index: Option<u64>,
    pub inclusion_delay: u64,
    pub validator: FlatValidator,
    pub active: bool,
}

impl AttesterStatus {
    fn new(validator: FlatValidator) -> Self {
        Self {
            flags: 0,
            proposer_index: None,
            inclusion_delay: 0,
            validator,
            active: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct EpochStakeSummary {
    pub source_stake: u64,
    pub target_stake: u64,
    pub head_stake: u64,
}

/// Work list for one epoch transition, aggregated in a single pass over the registry plus
/// one pass over the pending attestations. Dropped as soon as final updates ran.
#[derive(Debug, Default)]
pub struct EpochProcess {
    pub prev_epoch: u64,
    pub current_epoch: u64,
    pub statuses: Vec<AttesterStatus>,
    pub total_active_stake: u64,
    pub prev_epoch_unslashed_stake: EpochStakeSummary,
    pub curr_epoch_unslashed_target_stake: u64,

    /// Thanks to exit delay, this does not change within the epoch processing.
    pub active_validators: u64,
    pub indices_to_slash: Vec<u64>,
    pub indices_to_set_activation_eligibility: Vec<u64>,

    /// Ignores churn; the churn limit is applied when dequeuing, because finality still
    /// affects which of these actually activate.
    pub indices_to_maybe_activate: Vec<u64>,

    pub indices_to_eject: Vec<u64>,
    pub exit_queue_end: u64,
    pub exit_queue_end_churn: u64,
    pub churn_limit: u64,
}

pub fn prepare_epoch_process(
    epochs_context: &EpochsContext,
    state: &BeaconState,
) -> anyhow::Result<EpochProcess> {
    let current_epoch = epochs_context.current_shuffling.epoch;
    let prev_epoch = epochs_context.previous_shuffling.epoch;
    ensure!(
        current_epoch == state.get_current_epoch(),
        "epoch cache out of sync with state: {} != {}",
        current_epoch,
        state.get_current_epoch()
    );

    let mut out = EpochProcess {
        prev_epoch,
        current_epoch,
        statuses: Vec::with_capacity(state.validators.len()),
        ..EpochProcess::default()
    };

    let slashings_epoch = current_epoch + EPOCHS_PER_SLASHINGS_VECTOR / 2;
    let mut exit_queue_end = compute_activation_exit_epoch(current_epoch);
    let mut active_count: u64 = 0;

    for (i, validator) in state.validators.iter().enumerate() {
        let flat = FlatValidator::from(validator);
        let mut status = AttesterStatus::new(flat);

        if flat.slashed {
            if slashings_epoch == flat.withdrawable_epoch {
                out.indices_to_slash.push(i as u64);
            }
        } else {
            status.flags |= FLAG_UNSLASHED;
        }

        if flat.is_active(prev_epoch)
            || (flat.slashed && prev_epoch + 1 < flat.withdrawable_epoch)
        {
            status.flags |= FLAG_ELIGIBLE_ATTESTER;
        }

        if flat.is_active(current_epoch) {
            status.active = true;
            out.total_active_stake += flat.effective_balance;
            active_count += 1;
        }

        if flat.exit_epoch != FAR_FUTURE_EPOCH && flat.exit_epoch > exit_queue_end {
            exit_queue_end = flat.exit_epoch;
        }

        if flat.is_eligible_for_activation_queue() {
            out.indices_to_set_activation_eligibility.push(i as u64);
        }

        if flat.activation_epoch == FAR_FUTURE_EPOCH
            && flat.activation_eligibility_epoch <= current_epoch
        {
            out.indices_to_maybe_activate.push(i as u64);
        }

        if status.active
            && flat.effective_balance <= EJECTION_BALANCE
            && flat.exit_epoch == FAR_FUTURE_EPOCH
        {
            out.indices_to_eject.push(i as u64);
        }

        out.statuses.push(status);
    }

    out.active_validators = active_count;

    if out.total_active_stake < EFFECTIVE_BALANCE_INCREMENT {
        out.total_active_stake = EFFECTIVE_BALANCE_INCREMENT;
    }

    // Order by the sequence of activation_eligibility_epoch setting and then index.
    out.indices_to_maybe_activate.sort_unstable_by_key(|&index| {
        (
            out.statuses[index as usize]
                .validator
                .activation_eligibility_epoch,
            index,
        )
    });

    let mut exit_queue_end_churn = out
        .statuses
        .iter()
        .filter(|status| status.validator.exit_epoch == exit_queue_end)
        .count() as u64;

    let churn_limit = get_churn_limit(active_count);
    if exit_queue_end_churn >= churn_limit {
        exit_queue_end += 1;
        exit_queue_end_churn = 0;
    }

    out.exit_queue_end_churn = exit_queue_end_churn;
    out.exit_queue_end = exit_queue_end;
    out.churn_limit = churn_limit;

    // When used on top of the genesis state there is no block before genesis to reach for.
    if state.slot > 0 {
        apply_pending_attestations(
            epochs_context,
            state,
            &mut out.statuses,
            &state.previous_epoch_attestations,
            prev_epoch,
            true,
            FLAG_PREV_SOURCE_ATTESTER,
            FLAG_PREV_TARGET_ATTESTER,
            FLAG_PREV_HEAD_ATTESTER,
        )?;
    }
    // At the absolute start of the epoch the current epoch has no attestations, nor a target
    // block root to match them against.
    if compute_start_slot_at_epoch(current_epoch) < state.slot {
        apply_pending_attestations(
            epochs_context,
            state,
            &mut out.statuses,
            &state.current_epoch_attestations,
            current_epoch,
            false,
            FLAG_CURR_SOURCE_ATTESTER,
            FLAG_CURR_TARGET_ATTESTER,
            FLAG_CURR_HEAD_ATTESTER,
        )?;
    }

    let mut prev_source_stake: u64 = 0;
    let mut prev_target_stake: u64 = 0;
    let mut prev_head_stake: u64 = 0;
    let mut curr_target_stake: u64 = 0;

    for status in &out.statuses {
        let effective_balance = status.validator.effective_balance;
        if has_markers(status.flags, FLAG_PREV_SOURCE_ATTESTER | FLAG_UNSLASHED) {
            prev_source_stake += effective_balance;
            if has_markers(status.flags, FLAG_PREV_TARGET_ATTESTER) {
                prev_target_stake += effective_balance;
                if has_markers(status.flags, FLAG_PREV_HEAD_ATTESTER) {
                    prev_head_stake += effective_balance;
                }
            }
        }
        if has_markers(status.flags, FLAG_CURR_TARGET_ATTESTER | FLAG_UNSLASHED) {
            curr_target_stake += effective_balance;
        }
    }

    out.prev_epoch_unslashed_stake.source_stake =
        prev_source_stake.max(EFFECTIVE_BALANCE_INCREMENT);
    out.prev_epoch_unslashed_stake.target_stake =
        prev_target_stake.max(EFFECTIVE_BALANCE_INCREMENT);
    out.prev_epoch_unslashed_stake.head_stake = prev_head_stake.max(EFFECTIVE_BALANCE_INCREMENT);
    out.curr_epoch_unslashed_target_stake = curr_target_stake.max(EFFECTIVE_BALANCE_INCREMENT);

    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn apply_pending_attestations(
    epochs_context: &EpochsContext,
    state: &BeaconState,
    statuses: &mut [AttesterStatus],
    attestations: &[PendingAttestation],
    epoch: u64,
    track_earliest_inclusion: bool,
    source_flag: u8,
    target_flag: u8,
    head_flag: u8,
) -> anyhow::Result<()> {
    let actual_target_block_root =
        state.get_block_root_at_slot(compute_start_slot_at_epoch(epoch))?;

    for attestation in attestations {
        let data = &attestation.data;
        let voted_target_root = data.target.root == actual_target_block_root;
        let voted_head_root =
            data.beacon_block_root == state.get_block_root_at_slot(data.slot)?;

        // The attestation target is already known to be this epoch, read the committee from
        // the pre-computed shuffling directly.
        let committee = epochs_context.get_beacon_committee(data.slot, data.index)?;

        let mut participants = vec![];
        for (i, &validator_index) in committee.iter().enumerate() {
            if attestation
                .aggregation_bits
                .get(i)
                .map_err(|err| anyhow!("failed to get aggregation bit {i}: {err:?}"))?
            {
                participants.push(validator_index);
            }
        }

        if track_earliest_inclusion {
            for &participant in &participants {
                let status = &mut statuses[participant as usize];
                // Keep the inclusion with the smallest delay.
                if status.proposer_index.is_none()
                    || status.inclusion_delay > attestation.inclusion_delay
                {
                    status.proposer_index = Some(attestation.proposer_index);
                    status.inclusion_delay = attestation.inclusion_delay;
                }
            }
        }

        for &participant in &participants {
            let status = &mut statuses[participant as usize];
            status.flags |= source_flag;
            if voted_target_root {
                status.flags |= target_flag;
                // Head votes must be a subset of target votes.
                if voted_head_root {
                    status.flags |= head_flag;
                }
            }
        }
    }

    Ok(())
}
