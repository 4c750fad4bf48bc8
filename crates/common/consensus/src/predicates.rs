use crate::attestation_data::AttestationData;

/// Check if ``data_1`` and ``data_2`` are slashable according to Casper FFG rules.
pub fn is_slashable_attestation_data(data_1: &AttestationData, data_2: &AttestationData) -> bool {
    // Double vote
    (data_1 != data_2 && data_1.target.epoch == data_2.target.epoch)
        // Surround vote
        || (data_1.source.epoch < data_2.source.epoch && data_2.target.epoch < data_1.target.epoch)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use crate::checkpoint::Checkpoint;

    use super::*;

    fn attestation_data(source_epoch: u64, target_epoch: u64, root: u8) -> AttestationData {
        AttestationData {
            slot: target_epoch * 32,
            index: 0,
            beacon_block_root: B256::from_slice(&[root; 32]),
            source: Checkpoint {
                epoch: source_epoch,
                root: B256::ZERO,
            },
            target: Checkpoint {
                epoch: target_epoch,
                root: B256::ZERO,
            },
        }
    }

    #[test]
    fn test_double_vote_is_slashable() {
        let data_1 = attestation_data(0, 2, 0xaa);
        let data_2 = attestation_data(0, 2, 0xbb);
        assert!(is_slashable_attestation_data(&data_1, &data_2));
    }

    #[test]
    fn test_surround_vote_is_slashable() {
        let outer = attestation_data(0, 5, 0xaa);
        let inner = attestation_data(1, 4, 0xbb);
        assert!(is_slashable_attestation_data(&outer, &inner));
        // The surrounded attestation does not slash the other way around.
        assert!(!is_slashable_attestation_data(&inner, &outer));
    }

    #[test]
    fn test_identical_data_is_not_slashable() {
        let data = attestation_data(0, 2, 0xaa);
        assert!(!is_slashable_attestation_data(&data, &data));
    }
}
