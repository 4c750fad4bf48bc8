use anyhow::anyhow;
use ssz_types::VariableList;
use tree_hash::TreeHash;

use crate::{
    checkpoint::Checkpoint,
    constants::{
        BASE_REWARDS_PER_EPOCH, BASE_REWARD_FACTOR, EFFECTIVE_BALANCE_INCREMENT,
        EPOCHS_PER_ETH1_VOTING_PERIOD, EPOCHS_PER_HISTORICAL_VECTOR, EPOCHS_PER_SLASHINGS_VECTOR,
        GENESIS_EPOCH, HYSTERESIS_DOWNWARD_MULTIPLIER, HYSTERESIS_QUOTIENT,
        HYSTERESIS_UPWARD_MULTIPLIER, INACTIVITY_PENALTY_QUOTIENT, JUSTIFICATION_BITS_LENGTH,
        MAX_EFFECTIVE_BALANCE, MIN_EPOCHS_TO_INACTIVITY_PENALTY,
        MIN_VALIDATOR_WITHDRAWABILITY_DELAY, PROPORTIONAL_SLASHING_MULTIPLIER,
        PROPOSER_REWARD_QUOTIENT, SLOTS_PER_EPOCH, SLOTS_PER_HISTORICAL_ROOT,
    },
    historical_batch::HistoricalBatch,
    misc::{compute_activation_exit_epoch, integer_squareroot},
    phase0::beacon_state::BeaconState,
    state_transition::epoch_process::{
        EpochProcess, FLAG_ELIGIBLE_ATTESTER, FLAG_PREV_HEAD_ATTESTER,
        FLAG_PREV_SOURCE_ATTESTER, FLAG_PREV_TARGET_ATTESTER, FLAG_UNSLASHED, has_markers,
    },
};

pub fn process_justification_and_finalization(
    process: &EpochProcess,
    state: &mut BeaconState,
) -> anyhow::Result<()> {
    let previous_epoch = process.prev_epoch;
    let current_epoch = process.current_epoch;

    // Initial FFG checkpoint values have a `0x00` stub for `root`; skip FFG updates in the
    // first two epochs to avoid modifying this stub.
    if current_epoch <= GENESIS_EPOCH + 1 {
        return Ok(());
    }

    let old_previous_justified_checkpoint = state.previous_justified_checkpoint;
    let old_current_justified_checkpoint = state.current_justified_checkpoint;

    // Process justifications
    state.previous_justified_checkpoint = state.current_justified_checkpoint;

    for i in (1..JUSTIFICATION_BITS_LENGTH).rev() {
        let bit = state
            .justification_bits
            .get(i - 1)
            .map_err(|err| anyhow!("Failed to get justification bit: {err:?}"))?;
        state
            .justification_bits
            .set(i, bit)
            .map_err(|err| anyhow!("Failed to set justification bit: {err:?}"))?;
    }
    state
        .justification_bits
        .set(0, false)
        .map_err(|err| anyhow!("Failed to set justification bit 0: {err:?}"))?;

    if process.prev_epoch_unslashed_stake.target_stake * 3 >= process.total_active_stake * 2 {
        state.current_justified_checkpoint = Checkpoint {
            epoch: previous_epoch,
            root: state.get_block_root(previous_epoch)?,
        };
        state
            .justification_bits
            .set(1, true)
            .map_err(|err| anyhow!("Failed to set justification bit 1: {err:?}"))?;
    }
    if process.curr_epoch_unslashed_target_stake * 3 >= process.total_active_stake * 2 {
        state.current_justified_checkpoint = Checkpoint {
            epoch: current_epoch,
            root: state.get_block_root(current_epoch)?,
        };
        state
            .justification_bits
            .set(0, true)
            .map_err(|err| anyhow!("Failed to set justification bit 0: {err:?}"))?;
    }

    // Process finalizations
    let bits: Vec<bool> = state.justification_bits.iter().collect();

    // The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th as source
    if bits[1..4].iter().all(|&b| b)
        && old_previous_justified_checkpoint.epoch + 3 == current_epoch
    {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }
    // The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as source
    if bits[1..3].iter().all(|&b| b)
        && old_previous_justified_checkpoint.epoch + 2 == current_epoch
    {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }
    // The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd as source
    if bits[0..3].iter().all(|&b| b) && old_current_justified_checkpoint.epoch + 2 == current_epoch
    {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }
    // The 1st/2nd most recent epochs are justified, the 1st using the 2nd as source
    if bits[0..2].iter().all(|&b| b) && old_current_justified_checkpoint.epoch + 1 == current_epoch
    {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }

    Ok(())
}

#[derive(Debug)]
struct Deltas {
    rewards: Vec<u64>,
    penalties: Vec<u64>,
}

impl Deltas {
    fn new(size: usize) -> Self {
        Self {
            rewards: vec![0; size],
            penalties: vec![0; size],
        }
    }
}

#[derive(Debug)]
struct RewardsAndPenalties {
    source: Deltas,
    target: Deltas,
    head: Deltas,
    inclusion_delay: Deltas,
    inactivity: Deltas,
}

impl RewardsAndPenalties {
    fn new(size: usize) -> Self {
        Self {
            source: Deltas::new(size),
            target: Deltas::new(size),
            head: Deltas::new(size),
            inclusion_delay: Deltas::new(size),
            inactivity: Deltas::new(size),
        }
    }

    fn each(&self) -> [&Deltas; 5] {
        [
            &self.source,
            &self.target,
            &self.head,
            &self.inclusion_delay,
            &self.inactivity,
        ]
    }
}

fn get_attestation_rewards_and_penalties(
    process: &EpochProcess,
    state: &BeaconState,
) -> anyhow::Result<RewardsAndPenalties> {
    let validator_count = process.statuses.len();
    let mut res = RewardsAndPenalties::new(validator_count);

    let increment = EFFECTIVE_BALANCE_INCREMENT;
    let total_balance = process.total_active_stake.max(increment);

    // Sqrt first, before factoring out the increment for later usage.
    let balance_sq_root = integer_squareroot(total_balance);
    let finality_delay = process.prev_epoch - state.finalized_checkpoint.epoch;
    let is_inactivity_leak = finality_delay > MIN_EPOCHS_TO_INACTIVITY_PENALTY;

    // All summed effective balances are normalized to effective-balance increments, to avoid
    // overflows.
    let total_balance = total_balance / increment;
    let prev_epoch_source_stake = process.prev_epoch_unslashed_stake.source_stake / increment;
    let prev_epoch_target_stake = process.prev_epoch_unslashed_stake.target_stake / increment;
    let prev_epoch_head_stake = process.prev_epoch_unslashed_stake.head_stake / increment;

    for (i, status) in process.statuses.iter().enumerate() {
        let effective_balance = status.validator.effective_balance;
        let base_reward =
            effective_balance * BASE_REWARD_FACTOR / balance_sq_root / BASE_REWARDS_PER_EPOCH;
        let proposer_reward = base_reward / PROPOSER_REWARD_QUOTIENT;

        // Inclusion speed bonus
        if has_markers(status.flags, FLAG_PREV_SOURCE_ATTESTER | FLAG_UNSLASHED) {
            let proposer_index = status
                .proposer_index
                .ok_or_else(|| anyhow!("source attester {i} has no recorded inclusion"))?;
            res.inclusion_delay.rewards[proposer_index as usize] += proposer_reward;
            let max_attester_reward = base_reward - proposer_reward;
            res.inclusion_delay.rewards[i] += max_attester_reward / status.inclusion_delay;
        }

        if status.flags & FLAG_ELIGIBLE_ATTESTER == 0 {
            continue;
        }

        // In case of an inactivity leak the full base reward is canceled out by the
        // inactivity penalty deltas, so optimal participation receives full base reward
        // compensation here.

        // Expected FFG source
        if has_markers(status.flags, FLAG_PREV_SOURCE_ATTESTER | FLAG_UNSLASHED) {
            if is_inactivity_leak {
                res.source.rewards[i] += base_reward;
            } else {
                // Justification-participation reward
                res.source.rewards[i] += base_reward * prev_epoch_source_stake / total_balance;
            }
        } else {
            res.source.penalties[i] += base_reward;
        }

        // Expected FFG target
        if has_markers(status.flags, FLAG_PREV_TARGET_ATTESTER | FLAG_UNSLASHED) {
            if is_inactivity_leak {
                res.target.rewards[i] += base_reward;
            } else {
                // Boundary-attestation reward
                res.target.rewards[i] += base_reward * prev_epoch_target_stake / total_balance;
            }
        } else {
            res.target.penalties[i] += base_reward;
        }

        // Expected head
        if has_markers(status.flags, FLAG_PREV_HEAD_ATTESTER | FLAG_UNSLASHED) {
            if is_inactivity_leak {
                res.head.rewards[i] += base_reward;
            } else {
                // Canonical-participation reward
                res.head.rewards[i] += base_reward * prev_epoch_head_stake / total_balance;
            }
        } else {
            res.head.penalties[i] += base_reward;
        }

        // Take away max rewards while not finalizing
        if is_inactivity_leak {
            res.inclusion_delay.penalties[i] +=
                base_reward * BASE_REWARDS_PER_EPOCH - proposer_reward;
            if !has_markers(status.flags, FLAG_PREV_TARGET_ATTESTER | FLAG_UNSLASHED) {
                res.inactivity.penalties[i] +=
                    effective_balance * finality_delay / INACTIVITY_PENALTY_QUOTIENT;
            }
        }
    }

    Ok(res)
}

pub fn process_rewards_and_penalties(
    process: &EpochProcess,
    state: &mut BeaconState,
) -> anyhow::Result<()> {
    // No rewards are applied at the end of `GENESIS_EPOCH` because rewards are for work done
    // in the previous epoch.
    if process.current_epoch == GENESIS_EPOCH {
        return Ok(());
    }

    let res = get_attestation_rewards_and_penalties(process, state)?;

    let mut new_balances: Vec<u64> = state.balances.iter().copied().collect();
    for deltas in res.each() {
        for (balance, reward) in new_balances.iter_mut().zip(&deltas.rewards) {
            *balance += reward;
        }
    }
    for deltas in res.each() {
        for (balance, penalty) in new_balances.iter_mut().zip(&deltas.penalties) {
            *balance = balance.saturating_sub(*penalty);
        }
    }

    // Set all balances at once rather than one validator at a time.
    state.balances = VariableList::new(new_balances)
        .map_err(|err| anyhow!("Couldn't rebuild balance registry: {err:?}"))?;

    Ok(())
}

pub fn process_registry_updates(
    process: &EpochProcess,
    state: &mut BeaconState,
) -> anyhow::Result<()> {
    let mut exit_end = process.exit_queue_end;
    let mut end_churn = process.exit_queue_end_churn;

    // Process ejections
    for &index in &process.indices_to_eject {
        let validator = state
            .validators
            .get_mut(index as usize)
            .ok_or_else(|| anyhow!("validator {index} out of range"))?;
        validator.exit_epoch = exit_end;
        validator.withdrawable_epoch = exit_end + MIN_VALIDATOR_WITHDRAWABILITY_DELAY;

        end_churn += 1;
        if end_churn >= process.churn_limit {
            end_churn = 0;
            exit_end += 1;
        }
    }

    // Set new activation eligibilities
    for &index in &process.indices_to_set_activation_eligibility {
        let validator = state
            .validators
            .get_mut(index as usize)
            .ok_or_else(|| anyhow!("validator {index} out of range"))?;
        validator.activation_eligibility_epoch = process.current_epoch + 1;
    }

    // Dequeue validators for activation up to churn limit
    let finality_epoch = state.finalized_checkpoint.epoch;
    let activation_epoch = compute_activation_exit_epoch(process.current_epoch);
    for &index in process
        .indices_to_maybe_activate
        .iter()
        .take(process.churn_limit as usize)
    {
        if process.statuses[index as usize]
            .validator
            .activation_eligibility_epoch
            > finality_epoch
        {
            // Placement in queue is finalized; the remaining eligibility epochs are all
            // higher, break early.
            break;
        }
        let validator = state
            .validators
            .get_mut(index as usize)
            .ok_or_else(|| anyhow!("validator {index} out of range"))?;
        validator.activation_epoch = activation_epoch;
    }

    Ok(())
}

pub fn process_slashings(process: &EpochProcess, state: &mut BeaconState) -> anyhow::Result<()> {
    let total_balance = process.total_active_stake;
    let slashings_scale = std::cmp::min(
        state.slashings.iter().sum::<u64>() * PROPORTIONAL_SLASHING_MULTIPLIER,
        total_balance,
    );

    for &index in &process.indices_to_slash {
        // Factored out from the penalty numerator to avoid uint64 overflow.
        let increment = EFFECTIVE_BALANCE_INCREMENT;
        let effective_balance = process.statuses[index as usize].validator.effective_balance;
        let penalty_numerator = effective_balance / increment * slashings_scale;
        let penalty = penalty_numerator / total_balance * increment;
        state.decrease_balance(index, penalty)?;
    }

    Ok(())
}

pub fn process_final_updates(
    process: &EpochProcess,
    state: &mut BeaconState,
) -> anyhow::Result<()> {
    let current_epoch = process.current_epoch;
    let next_epoch = current_epoch + 1;

    // Reset eth1 data votes
    if next_epoch % EPOCHS_PER_ETH1_VOTING_PERIOD == 0 {
        state.eth1_data_votes = VariableList::default();
    }

    // Update effective balances with hysteresis
    let hysteresis_increment = EFFECTIVE_BALANCE_INCREMENT / HYSTERESIS_QUOTIENT;
    let downward_threshold = hysteresis_increment * HYSTERESIS_DOWNWARD_MULTIPLIER;
    let upward_threshold = hysteresis_increment * HYSTERESIS_UPWARD_MULTIPLIER;
    for (index, status) in process.statuses.iter().enumerate() {
        let balance = state.balances[index];
        let effective_balance = status.validator.effective_balance;
        if balance + downward_threshold < effective_balance
            || effective_balance + upward_threshold < balance
        {
            state.validators[index].effective_balance = std::cmp::min(
                balance - balance % EFFECTIVE_BALANCE_INCREMENT,
                MAX_EFFECTIVE_BALANCE,
            );
        }
    }

    // Reset slashings
    state.slashings[(next_epoch % EPOCHS_PER_SLASHINGS_VECTOR) as usize] = 0;

    // Set randao mix
    state.randao_mixes[(next_epoch % EPOCHS_PER_HISTORICAL_VECTOR) as usize] =
        state.get_randao_mix(current_epoch);

    // Set historical root accumulator
    if next_epoch % (SLOTS_PER_HISTORICAL_ROOT / SLOTS_PER_EPOCH) == 0 {
        let historical_batch = HistoricalBatch {
            block_roots: state.block_roots.clone(),
            state_roots: state.state_roots.clone(),
        };
        state
            .historical_roots
            .push(historical_batch.tree_hash_root())
            .map_err(|err| anyhow!("Failed to push historical root: {err:?}"))?;
    }

    // Rotate current/previous epoch attestations
    state.previous_epoch_attestations = std::mem::take(&mut state.current_epoch_attestations);

    Ok(())
}
