use alloy_primitives::B256;
use thiserror::Error;

use crate::checkpoint::Checkpoint;

/// Block, operation, or attestation rule violations. The transition functions surface these
/// through `anyhow::Error`; callers downcast to recover the rule that failed.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("block slot {block} does not match state slot {state}")]
    BadSlot { block: u64, state: u64 },
    #[error("block slot {block} is not newer than the latest block header slot {latest}")]
    BlockNotNewer { block: u64, latest: u64 },
    #[error("block proposer {actual} does not match the expected proposer {expected}")]
    BadProposer { expected: u64, actual: u64 },
    #[error("block parent root {actual} does not match the latest block header root {expected}")]
    BadParentRoot { expected: B256, actual: B256 },
    #[error("proposer {index} is slashed")]
    ProposerSlashed { index: u64 },
    #[error("invalid {context} signature")]
    BadSignature { context: &'static str },
    #[error("attestation source {actual:?} does not match the justified checkpoint {expected:?}")]
    BadCheckpoint {
        expected: Checkpoint,
        actual: Checkpoint,
    },
    #[error("attestation target epoch {target} is neither the previous nor the current epoch")]
    BadTargetEpoch { target: u64 },
    #[error("attestation target epoch {target} does not match the epoch of slot {slot}")]
    TargetEpochSlotMismatch { target: u64, slot: u64 },
    #[error("attestation of slot {slot} is not includable at state slot {state}")]
    AttestationNotIncludable { slot: u64, state: u64 },
    #[error("aggregation bits length {bits} does not match committee length {committee}")]
    AttestationBitLength { bits: usize, committee: usize },
    #[error("committee index {index} out of range, slot has {committees_per_slot} committees")]
    CommitteeOutOfRange {
        index: u64,
        committees_per_slot: u64,
    },
    #[error("epoch {epoch} is outside of the cached shuffling window")]
    EpochOutOfRange { epoch: u64 },
    #[error("proposer requested for slot {slot} outside of the current epoch")]
    ProposerOutOfRange { slot: u64 },
    #[error("validator {index} is not slashable")]
    NotSlashable { index: u64 },
    #[error("attestation data pair is not slashable")]
    NotSlashableData,
    #[error("no validator was slashed")]
    NoneSlashed,
    #[error("expected {expected} deposits in block, got {actual}")]
    DepositCountMismatch { expected: u64, actual: u64 },
    #[error("invalid deposit merkle branch at deposit index {index}")]
    BadDepositProof { index: u64 },
    #[error("validator {index} is not active")]
    ValidatorNotActive { index: u64 },
    #[error("validator {index} already initiated an exit")]
    AlreadyExited { index: u64 },
    #[error("exit epoch {epoch} is still in the future of epoch {current}")]
    ExitNotDue { epoch: u64, current: u64 },
    #[error("validator {index} has not been active long enough to exit")]
    TooYoungToExit { index: u64 },
    #[error("unknown validator {index}")]
    UnknownValidator { index: u64 },
}
