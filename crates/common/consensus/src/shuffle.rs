//! Whole-list swap-or-not shuffling.
//!
//! Round for round this computes the same permutation as
//! [`compute_shuffled_index`](crate::misc::compute_shuffled_index), but over the entire list at
//! once: each round hashes the seed and round byte for the pivot, then walks the two
//! mirrored halves of the list while reusing the position-window hash (new hash every 256
//! positions, new byte every 8). One pass therefore costs a handful of hashes instead of one
//! hash per index per round.

use alloy_primitives::B256;
use ethereum_hashing::hash;

use crate::{constants::SHUFFLE_ROUND_COUNT, misc::bytes_to_int64};

const SEED_SIZE: usize = 32;
const ROUND_SIZE: usize = 1;
const POSITION_WINDOW_SIZE: usize = 4;
const PIVOT_VIEW_SIZE: usize = SEED_SIZE + ROUND_SIZE;
const TOTAL_SIZE: usize = SEED_SIZE + ROUND_SIZE + POSITION_WINDOW_SIZE;

/// Shuffle ``input`` in place using ``seed``.
pub fn shuffle_list(input: &mut [u64], seed: B256) {
    inner_shuffle_list(input, seed, true)
}

/// Undo a shuffling of ``input`` in place, using the seed of the shuffling.
///
/// Committees are carved out of the unshuffled list: position ``i`` of the result holds the
/// validator that the forward shuffle would select for position ``i``.
pub fn unshuffle_list(input: &mut [u64], seed: B256) {
    inner_shuffle_list(input, seed, false)
}

fn inner_shuffle_list(input: &mut [u64], seed: B256, forwards: bool) {
    if input.len() <= 1 {
        return;
    }

    let list_size = input.len();
    let mut buf = [0u8; TOTAL_SIZE];
    // Iterating through the rounds in reverse un-swaps everything, un-shuffling the list.
    let mut round: u8 = if forwards { 0 } else { SHUFFLE_ROUND_COUNT - 1 };

    // The seed never changes, only the round byte and position window do.
    buf[..SEED_SIZE].copy_from_slice(seed.as_slice());

    loop {
        buf[SEED_SIZE] = round;
        let pivot =
            (bytes_to_int64(&hash(&buf[..PIVOT_VIEW_SIZE])[..8]) % list_size as u64) as usize;

        // The pivot splits the list in two; each half mirrors its pairs within the half, so
        // walking from the pivot inward visits every pair exactly once. The mirror bound is
        // strict, the mirror index itself never swaps with itself.
        let mut mirror = (pivot + 1) >> 1;
        buf[PIVOT_VIEW_SIZE..].copy_from_slice(&((pivot >> 8) as u32).to_le_bytes());
        let mut source = hash(&buf);
        let mut byte_value = source[(pivot & 0xff) >> 3];
        let (mut i, mut j) = (0usize, pivot);
        while i < mirror {
            // j is the bigger index of the pair and carries the position identity: refresh
            // the hash every 256th position and the byte every 8th, both aligned to j.
            if j & 0xff == 0xff {
                buf[PIVOT_VIEW_SIZE..].copy_from_slice(&((j >> 8) as u32).to_le_bytes());
                source = hash(&buf);
            }
            if j & 0x7 == 0x7 {
                byte_value = source[(j & 0xff) >> 3];
            }
            if (byte_value >> (j & 0x7)) & 0x1 == 1 {
                input.swap(i, j);
            }
            i += 1;
            j -= 1;
        }

        // Now the part after the pivot, from the end back to its mirror point.
        mirror = (pivot + list_size + 1) >> 1;
        let end = list_size - 1;
        buf[PIVOT_VIEW_SIZE..].copy_from_slice(&((end >> 8) as u32).to_le_bytes());
        source = hash(&buf);
        byte_value = source[(end & 0xff) >> 3];
        let (mut i, mut j) = (pivot + 1, end);
        while i < mirror {
            if j & 0xff == 0xff {
                buf[PIVOT_VIEW_SIZE..].copy_from_slice(&((j >> 8) as u32).to_le_bytes());
                source = hash(&buf);
            }
            if j & 0x7 == 0x7 {
                byte_value = source[(j & 0xff) >> 3];
            }
            if (byte_value >> (j & 0x7)) & 0x1 == 1 {
                input.swap(i, j);
            }
            i += 1;
            j -= 1;
        }

        if forwards {
            round += 1;
            if round == SHUFFLE_ROUND_COUNT {
                break;
            }
        } else {
            if round == 0 {
                break;
            }
            round -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::misc::compute_shuffled_index;

    use super::*;

    #[test]
    fn test_shuffle_and_unshuffle_are_inverses() {
        for seed_byte in [0u8, 0x42, 0xff] {
            let seed = B256::from_slice(&[seed_byte; 32]);
            for count in [2usize, 3, 10, 33, 257, 1000] {
                let original: Vec<u64> = (0..count as u64).collect();
                let mut list = original.clone();
                shuffle_list(&mut list, seed);
                unshuffle_list(&mut list, seed);
                assert_eq!(list, original);
            }
        }
    }

    #[test]
    fn test_unshuffle_matches_single_index_shuffle() {
        // The unshuffled list must agree with the per-index formulation:
        // unshuffle(input)[i] == input[compute_shuffled_index(i)].
        for seed_byte in [0u8, 0x2a, 0x90] {
            let seed = B256::from_slice(&[seed_byte; 32]);
            for count in [1usize, 2, 10, 100, 300] {
                let mut list: Vec<u64> = (0..count as u64).collect();
                unshuffle_list(&mut list, seed);
                for (position, &index) in list.iter().enumerate() {
                    let expected =
                        compute_shuffled_index(position, count, seed).expect("index in range");
                    assert_eq!(index, expected as u64);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_lists() {
        let seed = B256::from_slice(&[9u8; 32]);

        let mut empty: Vec<u64> = vec![];
        shuffle_list(&mut empty, seed);
        assert!(empty.is_empty());

        let mut single = vec![42u64];
        shuffle_list(&mut single, seed);
        unshuffle_list(&mut single, seed);
        assert_eq!(single, vec![42]);
    }

    #[test]
    fn test_distinct_seeds_disagree() {
        let original: Vec<u64> = (0..100).collect();
        let mut first = original.clone();
        let mut second = original.clone();
        shuffle_list(&mut first, B256::from_slice(&[1u8; 32]));
        shuffle_list(&mut second, B256::from_slice(&[2u8; 32]));
        assert_ne!(first, second);
    }
}
