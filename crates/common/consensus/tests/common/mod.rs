#![allow(dead_code)]

use alloy_primitives::B256;
use lumen_bls::{
    PrivateKey,
    traits::Signable,
};
use lumen_consensus::{
    constants::{DOMAIN_BEACON_PROPOSER, DOMAIN_RANDAO, MAX_EFFECTIVE_BALANCE},
    genesis::{GenesisDeposit, build_genesis_state},
    misc::{compute_epoch_at_slot, compute_signing_root},
    phase0::{
        beacon_block::{BeaconBlock, SignedBeaconBlock},
        beacon_block_body::BeaconBlockBody,
        beacon_state::BeaconState,
    },
    state_transition::EpochsContext,
};
use tree_hash::TreeHash;

pub fn private_key(index: usize) -> PrivateKey {
    PrivateKey::from_ikm(&[index as u8 + 1; 32]).expect("key generation")
}

/// A minimal genesis of fully-active validators, with the signing keys to drive them.
pub fn genesis_with_keys(count: usize) -> (BeaconState, Vec<PrivateKey>) {
    let keys: Vec<PrivateKey> = (0..count).map(private_key).collect();
    let deposits: Vec<GenesisDeposit> = keys
        .iter()
        .map(|key| GenesisDeposit {
            public_key: key.public_key().expect("public key derivation"),
            withdrawal_credentials: B256::ZERO,
            amount: MAX_EFFECTIVE_BALANCE,
        })
        .collect();
    let state = build_genesis_state(&deposits, 1_606_824_000, B256::from_slice(&[0xeb; 32]))
        .expect("genesis state");
    (state, keys)
}

/// Build an otherwise-empty block for the slot the state already sits in, with a valid
/// RANDAO reveal and parent root.
pub fn build_block(
    epochs_context: &EpochsContext,
    state: &BeaconState,
    keys: &[PrivateKey],
    slot: u64,
) -> BeaconBlock {
    assert_eq!(state.slot, slot, "state must be advanced to the block slot");
    let proposer_index = epochs_context.get_beacon_proposer(slot).expect("proposer");
    let epoch = compute_epoch_at_slot(slot);

    let randao_root = compute_signing_root(&epoch, state.get_domain(DOMAIN_RANDAO, Some(epoch)));
    let randao_reveal = keys[proposer_index as usize]
        .sign(randao_root.as_ref())
        .expect("randao signing");

    BeaconBlock {
        slot,
        proposer_index,
        parent_root: state.latest_block_header.tree_hash_root(),
        state_root: B256::ZERO,
        body: BeaconBlockBody {
            randao_reveal,
            eth1_data: state.eth1_data.clone(),
            ..BeaconBlockBody::default()
        },
    }
}

pub fn sign_block(state: &BeaconState, keys: &[PrivateKey], block: BeaconBlock) -> SignedBeaconBlock {
    let domain = state.get_domain(DOMAIN_BEACON_PROPOSER, None);
    let signing_root = compute_signing_root(&block, domain);
    let signature = keys[block.proposer_index as usize]
        .sign(signing_root.as_ref())
        .expect("block signing");
    SignedBeaconBlock {
        message: block,
        signature,
    }
}
