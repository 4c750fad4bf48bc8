use std::{collections::HashMap, sync::Arc};

use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use ethereum_hashing::{hash, hash_fixed};
use lumen_bls::PublicKey;

use crate::{
    constants::{
        DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER, GENESIS_EPOCH, MAX_COMMITTEES_PER_SLOT,
        MAX_EFFECTIVE_BALANCE, MAX_RANDOM_BYTE, SLOTS_PER_EPOCH, TARGET_COMMITTEE_SIZE,
    },
    misc::{compute_epoch_at_slot, compute_shuffled_index, compute_start_slot_at_epoch},
    phase0::beacon_state::BeaconState,
    shuffle::unshuffle_list,
    state_transition::errors::ValidationError,
};

/// Return the number of committees in each slot for an active set of the given size.
pub fn compute_committee_count(active_validator_count: usize) -> u64 {
    (active_validator_count as u64 / SLOTS_PER_EPOCH / TARGET_COMMITTEE_SIZE)
        .clamp(1, MAX_COMMITTEES_PER_SLOT)
}

/// Return from ``indices`` a random index sampled by effective balance.
pub fn compute_proposer_index(
    state: &BeaconState,
    indices: &[u64],
    seed: B256,
) -> anyhow::Result<u64> {
    ensure!(!indices.is_empty(), "There are no active validators");

    let total = indices.len();
    let mut i: usize = 0;
    loop {
        let candidate_index = indices[compute_shuffled_index(i % total, total, seed)?];

        let random_byte =
            hash(&[seed.as_slice(), &((i / 32) as u64).to_le_bytes()].concat())[i % 32];
        let effective_balance = state
            .validators
            .get(candidate_index as usize)
            .ok_or_else(|| anyhow!("validator {candidate_index} out of range"))?
            .effective_balance;

        if effective_balance * MAX_RANDOM_BYTE >= MAX_EFFECTIVE_BALANCE * random_byte as u64 {
            return Ok(candidate_index);
        }

        i += 1;
    }
}

/// The shuffled active set of one epoch, with its committee slices. Immutable once built,
/// only replaced wholesale on cache rotation.
#[derive(Debug)]
pub struct ShufflingEpoch {
    pub epoch: u64,

    /// Indices of validators active at ``epoch``, ascending.
    pub active_indices: Vec<u64>,

    /// ``active_indices`` after the inverse shuffle with the epoch's attester seed: position
    /// ``i`` holds the validator that the forward shuffle would place there.
    pub shuffling: Vec<u64>,

    /// Half-open bounds into ``shuffling``, by slot-in-epoch then committee index.
    committees: Vec<Vec<(usize, usize)>>,
}

impl ShufflingEpoch {
    /// ``indices_bounded`` carries ``(index, activation_epoch, exit_epoch)`` per validator.
    pub fn new(
        state: &BeaconState,
        indices_bounded: &[(u64, u64, u64)],
        epoch: u64,
    ) -> anyhow::Result<Self> {
        let seed = state.get_seed(epoch, DOMAIN_BEACON_ATTESTER);

        let active_indices: Vec<u64> = indices_bounded
            .iter()
            .filter_map(|&(index, activation_epoch, exit_epoch)| {
                (activation_epoch <= epoch && epoch < exit_epoch).then_some(index)
            })
            .collect();

        let mut shuffling = active_indices.clone();
        unshuffle_list(&mut shuffling, seed);

        let active_validator_count = active_indices.len() as u64;
        let committees_per_slot = compute_committee_count(active_indices.len());
        let committee_count = committees_per_slot * SLOTS_PER_EPOCH;

        let mut committees = Vec::with_capacity(SLOTS_PER_EPOCH as usize);
        for slot in 0..SLOTS_PER_EPOCH {
            let mut slot_committees = Vec::with_capacity(committees_per_slot as usize);
            for committee_index in 0..committees_per_slot {
                let index = slot * committees_per_slot + committee_index;
                let start_offset = (active_validator_count * index / committee_count) as usize;
                let end_offset = (active_validator_count * (index + 1) / committee_count) as usize;
                ensure!(
                    start_offset <= end_offset,
                    "start offset greater than end offset {start_offset} > {end_offset}"
                );
                slot_committees.push((start_offset, end_offset));
            }
            committees.push(slot_committees);
        }

        Ok(Self {
            epoch,
            active_indices,
            shuffling,
            committees,
        })
    }

    fn slot_committee_bounds(&self, epoch_slot: usize) -> &[(usize, usize)] {
        &self.committees[epoch_slot]
    }
}

/// Cache of the three shufflings around the attached state's current epoch, the per-slot
/// proposers of the current epoch, and the pubkey registry.
///
/// Cloning is cheap: the pubkey tables are copied (they grow with deposits), the shuffling
/// records and proposers are shared, as they are only ever replaced on rotation.
#[derive(Debug, Clone)]
pub struct EpochsContext {
    pub pubkey_to_index: HashMap<PublicKey, u64>,
    pub index_to_pubkey: Vec<PublicKey>,

    /// One proposer per slot, only of the current epoch.
    proposers: Arc<Vec<u64>>,
    pub previous_shuffling: Arc<ShufflingEpoch>,
    pub current_shuffling: Arc<ShufflingEpoch>,
    pub next_shuffling: Arc<ShufflingEpoch>,
}

impl EpochsContext {
    pub fn load_state(state: &BeaconState) -> anyhow::Result<Self> {
        let current_epoch = state.get_current_epoch();
        let previous_epoch = if current_epoch == GENESIS_EPOCH {
            GENESIS_EPOCH
        } else {
            current_epoch - 1
        };
        let next_epoch = current_epoch + 1;

        let indices_bounded = bounded_indices(state);
        let current_shuffling =
            Arc::new(ShufflingEpoch::new(state, &indices_bounded, current_epoch)?);
        let previous_shuffling = if previous_epoch == current_epoch {
            // In case of genesis
            current_shuffling.clone()
        } else {
            Arc::new(ShufflingEpoch::new(state, &indices_bounded, previous_epoch)?)
        };
        let next_shuffling = Arc::new(ShufflingEpoch::new(state, &indices_bounded, next_epoch)?);
        let proposers = Arc::new(compute_epoch_proposers(state, &current_shuffling)?);

        let mut context = Self {
            pubkey_to_index: HashMap::new(),
            index_to_pubkey: vec![],
            proposers,
            previous_shuffling,
            current_shuffling,
            next_shuffling,
        };
        context.sync_pubkeys(state)?;
        Ok(context)
    }

    /// Extend the pubkey registry with validators appended since the last sync. The registry
    /// is append-only, indices are never reordered or removed within a chain.
    pub fn sync_pubkeys(&mut self, state: &BeaconState) -> anyhow::Result<()> {
        ensure!(
            self.pubkey_to_index.len() == self.index_to_pubkey.len(),
            "length of pubkey_to_index and index_to_pubkey do not match: {} != {}",
            self.pubkey_to_index.len(),
            self.index_to_pubkey.len()
        );

        for index in self.index_to_pubkey.len()..state.validators.len() {
            let public_key = state.validators[index].public_key.clone();
            self.pubkey_to_index.insert(public_key.clone(), index as u64);
            self.index_to_pubkey.push(public_key);
        }
        Ok(())
    }

    /// Advance the three-epoch window after an epoch transition: the state is expected to
    /// already sit in the first slot of the new epoch.
    pub fn rotate_epochs(&mut self, state: &BeaconState) -> anyhow::Result<()> {
        self.previous_shuffling = self.current_shuffling.clone();
        self.current_shuffling = self.next_shuffling.clone();

        let next_epoch = self.current_shuffling.epoch + 1;
        let indices_bounded = bounded_indices(state);
        self.next_shuffling = Arc::new(ShufflingEpoch::new(state, &indices_bounded, next_epoch)?);
        self.proposers = Arc::new(compute_epoch_proposers(state, &self.current_shuffling)?);
        Ok(())
    }

    fn slot_shuffling(&self, slot: u64) -> Result<&ShufflingEpoch, ValidationError> {
        let epoch = compute_epoch_at_slot(slot);
        if epoch == self.previous_shuffling.epoch {
            Ok(self.previous_shuffling.as_ref())
        } else if epoch == self.current_shuffling.epoch {
            Ok(self.current_shuffling.as_ref())
        } else if epoch == self.next_shuffling.epoch {
            Ok(self.next_shuffling.as_ref())
        } else {
            Err(ValidationError::EpochOutOfRange { epoch })
        }
    }

    /// Return the beacon committee at ``slot`` for ``index``.
    pub fn get_beacon_committee(&self, slot: u64, index: u64) -> anyhow::Result<&[u64]> {
        let shuffling = self.slot_shuffling(slot)?;
        let epoch_slot = (slot % SLOTS_PER_EPOCH) as usize;
        let bounds = shuffling.slot_committee_bounds(epoch_slot);
        let &(start, end) = bounds.get(index as usize).ok_or(
            ValidationError::CommitteeOutOfRange {
                index,
                committees_per_slot: bounds.len() as u64,
            },
        )?;
        Ok(&shuffling.shuffling[start..end])
    }

    pub fn get_committee_count_at_slot(&self, slot: u64) -> anyhow::Result<u64> {
        let shuffling = self.slot_shuffling(slot)?;
        let epoch_slot = (slot % SLOTS_PER_EPOCH) as usize;
        Ok(shuffling.slot_committee_bounds(epoch_slot).len() as u64)
    }

    pub fn get_beacon_proposer(&self, slot: u64) -> anyhow::Result<u64> {
        let epoch = compute_epoch_at_slot(slot);
        if epoch != self.current_shuffling.epoch {
            return Err(ValidationError::ProposerOutOfRange { slot }.into());
        }
        Ok(self.proposers[(slot % SLOTS_PER_EPOCH) as usize])
    }
}

fn bounded_indices(state: &BeaconState) -> Vec<(u64, u64, u64)> {
    state
        .validators
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u64, v.activation_epoch, v.exit_epoch))
        .collect()
}

fn compute_epoch_proposers(
    state: &BeaconState,
    shuffling: &ShufflingEpoch,
) -> anyhow::Result<Vec<u64>> {
    let epoch_seed = state.get_seed(shuffling.epoch, DOMAIN_BEACON_PROPOSER);
    let start_slot = compute_start_slot_at_epoch(shuffling.epoch);
    (start_slot..start_slot + SLOTS_PER_EPOCH)
        .map(|slot| {
            let slot_seed = B256::from(hash_fixed(
                &[epoch_seed.as_slice(), &slot.to_le_bytes()].concat(),
            ));
            compute_proposer_index(state, &shuffling.active_indices, slot_seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use lumen_bls::PrivateKey;

    use crate::{
        constants::MAX_EFFECTIVE_BALANCE,
        genesis::{GenesisDeposit, build_genesis_state},
    };

    use super::*;

    fn test_state(validator_count: usize) -> BeaconState {
        let deposits: Vec<GenesisDeposit> = (0..validator_count)
            .map(|i| GenesisDeposit {
                public_key: PrivateKey::from_ikm(&[i as u8 + 1; 32])
                    .expect("key generation")
                    .public_key()
                    .expect("public key derivation"),
                withdrawal_credentials: B256::ZERO,
                amount: MAX_EFFECTIVE_BALANCE,
            })
            .collect();
        build_genesis_state(&deposits, 0, B256::from_slice(&[0xeb; 32])).expect("genesis state")
    }

    #[test]
    fn test_committees_partition_the_shuffling() {
        let state = test_state(64);
        let context = EpochsContext::load_state(&state).expect("context loads");

        let mut concatenated = vec![];
        for slot in 0..SLOTS_PER_EPOCH {
            let committees_per_slot = context
                .get_committee_count_at_slot(slot)
                .expect("slot in window");
            for index in 0..committees_per_slot {
                concatenated
                    .extend_from_slice(context.get_beacon_committee(slot, index).expect("committee"));
            }
        }

        // Concatenating all committees in order re-reads the shuffling exactly, and the
        // shuffling is a permutation of the active set.
        assert_eq!(concatenated, context.current_shuffling.shuffling);
        let mut sorted = concatenated.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, context.current_shuffling.active_indices);
    }

    #[test]
    fn test_out_of_window_queries_fail() {
        let state = test_state(16);
        let context = EpochsContext::load_state(&state).expect("context loads");

        let far_slot = 10 * SLOTS_PER_EPOCH;
        assert!(context.get_beacon_committee(far_slot, 0).is_err());
        assert!(context.get_committee_count_at_slot(far_slot).is_err());

        // Proposers are only cached for the current epoch, not for the whole window.
        assert!(context.get_beacon_proposer(SLOTS_PER_EPOCH).is_err());
        assert!(context.get_beacon_proposer(0).is_ok());
    }

    #[test]
    fn test_committee_index_out_of_range_fails() {
        let state = test_state(16);
        let context = EpochsContext::load_state(&state).expect("context loads");
        let committees_per_slot = context.get_committee_count_at_slot(0).expect("slot in window");
        assert!(context.get_beacon_committee(0, committees_per_slot).is_err());
    }

    #[test]
    fn test_proposers_are_active_validators() {
        let state = test_state(21);
        let context = EpochsContext::load_state(&state).expect("context loads");
        for slot in 0..SLOTS_PER_EPOCH {
            let proposer = context.get_beacon_proposer(slot).expect("proposer");
            assert!(context.current_shuffling.active_indices.contains(&proposer));
        }
    }
}
