use alloy_primitives::B256;
use anyhow::anyhow;
use lumen_bls::PublicKey;
use ssz_types::{FixedVector, VariableList};
use tree_hash::TreeHash;

use crate::{
    beacon_block_header::BeaconBlockHeader,
    constants::{
        EFFECTIVE_BALANCE_INCREMENT, EPOCHS_PER_HISTORICAL_VECTOR, FAR_FUTURE_EPOCH,
        GENESIS_EPOCH, GENESIS_FORK_VERSION, GENESIS_SLOT, MAX_EFFECTIVE_BALANCE,
    },
    eth_1_data::Eth1Data,
    fork::Fork,
    phase0::{beacon_block_body::BeaconBlockBody, beacon_state::BeaconState},
    validator::Validator,
};

/// One pre-validated genesis deposit: pubkey, withdrawal credentials and amount in Gwei.
pub struct GenesisDeposit {
    pub public_key: PublicKey,
    pub withdrawal_credentials: B256,
    pub amount: u64,
}

/// Build a genesis state from already-verified deposits.
///
/// Validators whose effective balance reaches ``MAX_EFFECTIVE_BALANCE`` are active at
/// ``GENESIS_EPOCH``; the rest queue through the regular activation flow.
pub fn build_genesis_state(
    deposits: &[GenesisDeposit],
    genesis_time: u64,
    eth1_block_hash: B256,
) -> anyhow::Result<BeaconState> {
    let mut validators = vec![];
    let mut balances = vec![];

    for deposit in deposits {
        let effective_balance = std::cmp::min(
            deposit.amount - deposit.amount % EFFECTIVE_BALANCE_INCREMENT,
            MAX_EFFECTIVE_BALANCE,
        );
        let mut validator = Validator {
            public_key: deposit.public_key.clone(),
            withdrawal_credentials: deposit.withdrawal_credentials,
            effective_balance,
            slashed: false,
            activation_eligibility_epoch: FAR_FUTURE_EPOCH,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        };
        if validator.effective_balance == MAX_EFFECTIVE_BALANCE {
            validator.activation_eligibility_epoch = GENESIS_EPOCH;
            validator.activation_epoch = GENESIS_EPOCH;
        }
        validators.push(validator);
        balances.push(deposit.amount);
    }

    let validators = VariableList::new(validators)
        .map_err(|err| anyhow!("Couldn't build validator registry: {err:?}"))?;
    let genesis_validators_root = validators.tree_hash_root();
    let deposit_count = deposits.len() as u64;

    Ok(BeaconState {
        genesis_time,
        genesis_validators_root,
        slot: GENESIS_SLOT,
        fork: Fork {
            previous_version: GENESIS_FORK_VERSION,
            current_version: GENESIS_FORK_VERSION,
            epoch: GENESIS_EPOCH,
        },
        latest_block_header: BeaconBlockHeader {
            body_root: BeaconBlockBody::default().tree_hash_root(),
            ..BeaconBlockHeader::default()
        },
        block_roots: FixedVector::default(),
        state_roots: FixedVector::default(),
        historical_roots: VariableList::default(),
        eth1_data: Eth1Data {
            deposit_root: B256::ZERO,
            deposit_count,
            block_hash: eth1_block_hash,
        },
        eth1_data_votes: VariableList::default(),
        eth1_deposit_index: deposit_count,
        validators,
        balances: VariableList::new(balances)
            .map_err(|err| anyhow!("Couldn't build balance registry: {err:?}"))?,
        randao_mixes: FixedVector::from(vec![
            eth1_block_hash;
            EPOCHS_PER_HISTORICAL_VECTOR as usize
        ]),
        slashings: FixedVector::default(),
        previous_epoch_attestations: VariableList::default(),
        current_epoch_attestations: VariableList::default(),
        justification_bits: ssz_types::BitVector::default(),
        previous_justified_checkpoint: Default::default(),
        current_justified_checkpoint: Default::default(),
        finalized_checkpoint: Default::default(),
    })
}
