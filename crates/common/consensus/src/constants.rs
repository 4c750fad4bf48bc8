use alloy_primitives::{aliases::B32, fixed_bytes};

pub const BASE_REWARDS_PER_EPOCH: u64 = 4;
pub const BASE_REWARD_FACTOR: u64 = 64;
pub const CHURN_LIMIT_QUOTIENT: u64 = 65536;
pub const DEPOSIT_CONTRACT_TREE_DEPTH: u64 = 32;
pub const DOMAIN_BEACON_ATTESTER: B32 = fixed_bytes!("0x01000000");
pub const DOMAIN_BEACON_PROPOSER: B32 = fixed_bytes!("0x00000000");
pub const DOMAIN_DEPOSIT: B32 = fixed_bytes!("0x03000000");
pub const DOMAIN_RANDAO: B32 = fixed_bytes!("0x02000000");
pub const DOMAIN_VOLUNTARY_EXIT: B32 = fixed_bytes!("0x04000000");
pub const EFFECTIVE_BALANCE_INCREMENT: u64 = 1_000_000_000;
pub const EJECTION_BALANCE: u64 = 16_000_000_000;
pub const EPOCHS_PER_ETH1_VOTING_PERIOD: u64 = 32;
pub const EPOCHS_PER_HISTORICAL_VECTOR: u64 = 65536;
pub const EPOCHS_PER_SLASHINGS_VECTOR: u64 = 8192;
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;
pub const GENESIS_EPOCH: u64 = 0;
pub const GENESIS_FORK_VERSION: B32 = fixed_bytes!("0x00000000");
pub const GENESIS_SLOT: u64 = 0;
pub const HYSTERESIS_DOWNWARD_MULTIPLIER: u64 = 1;
pub const HYSTERESIS_QUOTIENT: u64 = 4;
pub const HYSTERESIS_UPWARD_MULTIPLIER: u64 = 5;
pub const INACTIVITY_PENALTY_QUOTIENT: u64 = 16_777_216;
pub const JUSTIFICATION_BITS_LENGTH: usize = 4;
pub const MAX_ATTESTATIONS: u64 = 128;
pub const MAX_ATTESTER_SLASHINGS: u64 = 2;
pub const MAX_COMMITTEES_PER_SLOT: u64 = 64;
pub const MAX_DEPOSITS: u64 = 16;
pub const MAX_EFFECTIVE_BALANCE: u64 = 32_000_000_000;
pub const MAX_PROPOSER_SLASHINGS: u64 = 16;
pub const MAX_RANDOM_BYTE: u64 = 255;
pub const MAX_SEED_LOOKAHEAD: u64 = 4;
pub const MAX_VALIDATORS_PER_COMMITTEE: u64 = 2048;
pub const MAX_VOLUNTARY_EXITS: u64 = 16;
pub const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;
pub const MIN_EPOCHS_TO_INACTIVITY_PENALTY: u64 = 4;
pub const MIN_PER_EPOCH_CHURN_LIMIT: u64 = 4;
pub const MIN_SEED_LOOKAHEAD: u64 = 1;
pub const MIN_SLASHING_PENALTY_QUOTIENT: u64 = 32;
pub const MIN_VALIDATOR_WITHDRAWABILITY_DELAY: u64 = 256;
pub const PROPORTIONAL_SLASHING_MULTIPLIER: u64 = 3;
pub const PROPOSER_REWARD_QUOTIENT: u64 = 8;
pub const SECONDS_PER_SLOT: u64 = 12;
pub const SHARD_COMMITTEE_PERIOD: u64 = 256;
pub const SHUFFLE_ROUND_COUNT: u8 = 90;
pub const SLOTS_PER_EPOCH: u64 = 32;
pub const SLOTS_PER_HISTORICAL_ROOT: u64 = 8192;
pub const TARGET_COMMITTEE_SIZE: u64 = 128;
pub const WHISTLEBLOWER_REWARD_QUOTIENT: u64 = 512;

// Withdrawal prefixes
pub const BLS_WITHDRAWAL_PREFIX: &[u8] = &[0];
