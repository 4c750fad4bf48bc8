use alloy_primitives::B256;
use lumen_bls::PublicKey;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Validator {
    #[serde(rename = "pubkey")]
    pub public_key: PublicKey,

    /// Commitment to pubkey for withdrawals
    pub withdrawal_credentials: B256,

    /// Balance at stake
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
    pub slashed: bool,

    /// When criteria for activation were met
    #[serde(with = "serde_utils::quoted_u64")]
    pub activation_eligibility_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub activation_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub exit_epoch: u64,

    /// When validator can withdraw funds
    #[serde(with = "serde_utils::quoted_u64")]
    pub withdrawable_epoch: u64,
}

impl Validator {
    pub fn is_active_validator(&self, epoch: u64) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    pub fn is_slashable_validator(&self, epoch: u64) -> bool {
        !self.slashed && self.activation_epoch <= epoch && epoch < self.withdrawable_epoch
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::{FAR_FUTURE_EPOCH, MAX_EFFECTIVE_BALANCE};

    use super::*;

    fn validator(activation_epoch: u64, exit_epoch: u64) -> Validator {
        Validator {
            public_key: PublicKey::default(),
            withdrawal_credentials: B256::ZERO,
            effective_balance: MAX_EFFECTIVE_BALANCE,
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch,
            exit_epoch,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        }
    }

    #[test]
    fn test_is_active_validator() {
        let v = validator(2, 10);
        assert!(!v.is_active_validator(1));
        assert!(v.is_active_validator(2));
        assert!(v.is_active_validator(9));
        assert!(!v.is_active_validator(10));
    }

    #[test]
    fn test_is_slashable_validator() {
        let mut v = validator(2, 10);
        v.withdrawable_epoch = 20;
        assert!(v.is_slashable_validator(5));
        assert!(v.is_slashable_validator(19));
        assert!(!v.is_slashable_validator(20));
        v.slashed = true;
        assert!(!v.is_slashable_validator(5));
    }
}
