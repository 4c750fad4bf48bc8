//! Binary Merkle tree helpers for SSZ-style proofs.

use alloy_primitives::B256;
use anyhow::ensure;

fn hash_pair(left: &B256, right: &B256) -> B256 {
    ethereum_hashing::hash32_concat(left.as_slice(), right.as_slice()).into()
}

/// Verify that `leaf` sits at `index` of the `depth`-deep tree committed to by `root`,
/// given the sibling hashes on the path in `branch` (bottom first).
///
/// Each level consumes one bit of the index: the bit decides whether the running node is
/// the right or the left child of its parent.
pub fn is_valid_merkle_branch(
    leaf: B256,
    branch: &[B256],
    depth: u64,
    index: u64,
    root: B256,
) -> bool {
    if (branch.len() as u64) < depth {
        return false;
    }

    let mut node = leaf;
    let mut path = index;
    for sibling in &branch[..depth as usize] {
        node = if path & 1 == 1 {
            hash_pair(sibling, &node)
        } else {
            hash_pair(&node, sibling)
        };
        path >>= 1;
    }
    node == root
}

/// Roots of all-zero subtrees, `zero_hashes(d)[i]` being the root of a zero subtree of
/// height `i`. Used to complete sparse branches of mostly-empty trees such as the
/// deposit contract tree.
pub fn zero_hashes(depth: u64) -> Vec<B256> {
    let mut hashes = vec![B256::ZERO];
    for i in 0..depth as usize {
        let above = hash_pair(&hashes[i], &hashes[i]);
        hashes.push(above);
    }
    hashes
}

/// Build a `depth`-deep tree over `leaves`, padded with zero leaves.
///
/// The tree is returned level by level: element 0 is the padded leaf layer, each following
/// element halves in width, and the last holds only the root.
pub fn merkle_tree(leaves: &[B256], depth: u64) -> anyhow::Result<Vec<Vec<B256>>> {
    let width = 1usize << depth;
    ensure!(
        leaves.len() <= width,
        "Number of leaves is greater than the bottom width (depth too small)"
    );

    let mut level = leaves.to_vec();
    level.resize(width, B256::ZERO);

    let mut tree = Vec::with_capacity(depth as usize + 1);
    for _ in 0..depth {
        let above: Vec<B256> = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        tree.push(level);
        level = above;
    }
    tree.push(level);

    Ok(tree)
}

/// Extract the branch proving the leaf at `index` out of a tree built by [`merkle_tree`],
/// bottom sibling first.
pub fn generate_proof(tree: &[Vec<B256>], index: u64, depth: u64) -> anyhow::Result<Vec<B256>> {
    ensure!(
        tree.len() as u64 == depth + 1,
        "Tree has the wrong number of levels for its depth"
    );
    ensure!(index < 1u64 << depth, "Index out of bounds");

    let mut proof = Vec::with_capacity(depth as usize);
    let mut position = index as usize;
    for level in &tree[..depth as usize] {
        proof.push(level[position ^ 1]);
        position >>= 1;
    }

    Ok(proof)
}

/// `hash(root || little-endian length)`, the SSZ list length mix-in.
pub fn mix_in_length(root: B256, length: u64) -> B256 {
    let mut length_bytes = [0u8; 32];
    length_bytes[..8].copy_from_slice(&length.to_le_bytes());
    hash_pair(&root, &B256::from(length_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proofs_round_trip() {
        let leaves = vec![
            B256::from_slice(&[0xAA; 32]),
            B256::from_slice(&[0xBB; 32]),
            B256::from_slice(&[0xCC; 32]),
        ];
        let depth = 2;

        let tree = merkle_tree(&leaves, depth).expect("tree fits the depth");
        let root = tree[depth as usize][0];

        for (index, leaf) in leaves.iter().enumerate() {
            let proof = generate_proof(&tree, index as u64, depth).expect("index in range");
            assert!(is_valid_merkle_branch(*leaf, &proof, depth, index as u64, root));
        }

        // A proof for one index must not validate another leaf.
        let proof = generate_proof(&tree, 0, depth).expect("index in range");
        assert!(!is_valid_merkle_branch(leaves[1], &proof, depth, 0, root));
    }

    #[test]
    fn test_short_branch_is_rejected() {
        let leaf = B256::from_slice(&[0xAA; 32]);
        let branch = zero_hashes(3);
        assert!(!is_valid_merkle_branch(leaf, &branch[..2], 4, 0, B256::ZERO));
    }

    #[test]
    fn test_zero_hashes_match_empty_tree() {
        let depth = 5;
        let tree = merkle_tree(&[], depth).expect("empty tree");
        assert_eq!(zero_hashes(depth)[depth as usize], tree[depth as usize][0]);
    }

    #[test]
    fn test_sparse_branch_from_zero_hashes() {
        // A single occupied leaf at index 0: every sibling on the path is a zero subtree.
        let depth = 32;
        let leaf = B256::from_slice(&[0x11; 32]);
        let branch = zero_hashes(depth);

        let mut root = leaf;
        for node in branch[..depth as usize].iter() {
            root = hash_pair(&root, node);
        }

        assert!(is_valid_merkle_branch(leaf, &branch[..depth as usize], depth, 0, root));
    }
}
