//! Merkle tree over SHA-256 leaf digests.
//!
//! Parents are `SHA-256(left || right)` over the raw 32-byte digests. A level
//! with an odd number of nodes pairs its last node with itself. Leaves are
//! used as given, so a single leaf is its own root.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::hash::Sha256Hash;

/// Parent digest of two children.
pub fn hash_pair(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Sha256Hash::from_bytes(hasher.finalize().into())
}

fn next_level(nodes: &[Sha256Hash]) -> Vec<Sha256Hash> {
    nodes
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [only] => hash_pair(only, only),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Root over an ordered list of leaf digests.
pub fn build_merkle_root(hashes: &[Sha256Hash]) -> Result<Sha256Hash, CryptoError> {
    if hashes.is_empty() {
        return Err(CryptoError::EmptyMerkleInput);
    }

    let mut level = hashes.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    Ok(level[0])
}

/// Side on which a proof sibling sits relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingPosition {
    Left,
    Right,
}

/// One step of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Sha256Hash,
    pub position: SiblingPosition,
}

/// Inclusion proof for one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf: Sha256Hash,
    pub steps: Vec<ProofStep>,
    pub root: Sha256Hash,
}

impl MerkleProof {
    /// Replay this proof against its own recorded root.
    pub fn verify(&self) -> bool {
        verify_merkle_proof(&self.leaf, &self.steps, &self.root)
    }
}

/// A fully materialised tree; every level is kept so proofs can be produced
/// for any leaf.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Sha256Hash>>,
}

impl MerkleTree {
    /// Build a tree from ordered leaf digests.
    pub fn build(leaves: &[Sha256Hash]) -> Result<Self, CryptoError> {
        if leaves.is_empty() {
            return Err(CryptoError::EmptyMerkleInput);
        }

        let mut levels = vec![leaves.to_vec()];
        while let Some(top) = levels.last().filter(|level| level.len() > 1) {
            let parent = next_level(top);
            levels.push(parent);
        }
        Ok(Self { levels })
    }

    /// Root digest.
    pub fn root(&self) -> Sha256Hash {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(|| Sha256Hash::from_bytes([0; 32]))
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tree height, counting the leaf level.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaf = *self.levels.first()?.get(index)?;
        let mut steps = Vec::with_capacity(self.depth().saturating_sub(1));
        let mut position = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let step = if position % 2 == 1 {
                ProofStep {
                    sibling: level[position - 1],
                    position: SiblingPosition::Left,
                }
            } else {
                let sibling = level.get(position + 1).unwrap_or(&level[position]);
                ProofStep {
                    sibling: *sibling,
                    position: SiblingPosition::Right,
                }
            };
            steps.push(step);
            position /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            leaf,
            steps,
            root: self.root(),
        })
    }

    /// Proofs for every leaf, in leaf order.
    pub fn proofs(&self) -> Vec<MerkleProof> {
        (0..self.len()).filter_map(|i| self.proof(i)).collect()
    }
}

/// Replay `proof` from `leaf` and compare against `expected_root`.
pub fn verify_merkle_proof(
    leaf: &Sha256Hash,
    proof: &[ProofStep],
    expected_root: &Sha256Hash,
) -> bool {
    let computed = proof.iter().fold(*leaf, |current, step| match step.position {
        SiblingPosition::Left => hash_pair(&step.sibling, &current),
        SiblingPosition::Right => hash_pair(&current, &step.sibling),
    });
    computed == *expected_root
}
