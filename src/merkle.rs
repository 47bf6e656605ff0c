// src/merkle.rs
//! Merkle tree over ordered batches of source-chain block hashes
//!
//! The root computation must be byte-exact across implementations: the
//! submitter and every challenger have to derive identical roots from
//! identical leaf orderings, or the verification game cannot settle
//! disputes. Node hash is SHA-256 over the concatenated children; a
//! level with an odd node count carries the last node up paired with
//! itself.

use crate::Hash;
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

/// Root of the empty tree. A fixed sentinel, deliberately not the hash
/// of any input.
pub const EMPTY_TREE_ROOT: Hash = [0u8; 32];

fn hash_nodes(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Merkle tree over a fixed leaf sequence
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct MerkleTree {
    /// Leaves of the tree
    leaves: Vec<Hash>,

    /// Root of the tree
    root: Hash,
}

impl MerkleTree {
    /// Build a tree from an ordered leaf sequence
    pub fn new(leaves: Vec<Hash>) -> Self {
        let root = Self::compute_root(&leaves);
        Self { leaves, root }
    }

    /// Compute the merkle root of an ordered leaf sequence
    ///
    /// Pure function: empty input yields [`EMPTY_TREE_ROOT`], a single
    /// leaf is its own root, odd levels duplicate their last node.
    pub fn compute_root(leaves: &[Hash]) -> Hash {
        if leaves.is_empty() {
            return EMPTY_TREE_ROOT;
        }

        let mut current_level = leaves.to_vec();
        while current_level.len() > 1 {
            let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);
            for pair in current_level.chunks(2) {
                let left = pair[0];
                // Odd count: the last node pairs with itself
                let right = if pair.len() == 2 { pair[1] } else { pair[0] };
                next_level.push(hash_nodes(&left, &right));
            }
            current_level = next_level;
        }

        current_level[0]
    }

    /// Get the root of the tree
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Generate a membership proof for the leaf at `index`
    ///
    /// Returns the sibling path from the leaf to the root; empty for a
    /// single-leaf tree or an out-of-range index.
    pub fn generate_proof(&self, index: usize) -> Vec<Hash> {
        if index >= self.leaves.len() {
            return Vec::new();
        }

        let mut proof = Vec::new();
        let mut current_index = index;
        let mut current_level = self.leaves.clone();

        while current_level.len() > 1 {
            let sibling_index = if current_index % 2 == 0 {
                current_index + 1
            } else {
                current_index - 1
            };
            // Missing sibling on an odd level: the node is its own pair
            let sibling = if sibling_index < current_level.len() {
                current_level[sibling_index]
            } else {
                current_level[current_index]
            };
            proof.push(sibling);

            let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);
            for pair in current_level.chunks(2) {
                let left = pair[0];
                let right = if pair.len() == 2 { pair[1] } else { pair[0] };
                next_level.push(hash_nodes(&left, &right));
            }
            current_level = next_level;
            current_index /= 2;
        }

        proof
    }

    /// Verify a membership proof against a root
    pub fn verify_proof(root: &Hash, leaf: &Hash, proof: &[Hash], index: usize) -> bool {
        let mut current = *leaf;
        let mut current_index = index;

        for sibling in proof {
            current = if current_index % 2 == 0 {
                hash_nodes(&current, sibling)
            } else {
                hash_nodes(sibling, &current)
            };
            current_index >>= 1;
        }

        current == *root
    }

    /// Get a leaf from the tree
    pub fn get_leaf(&self, index: usize) -> Option<Hash> {
        self.leaves.get(index).copied()
    }

    /// Get all leaves of the tree
    pub fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    /// Number of leaves in the tree
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}
