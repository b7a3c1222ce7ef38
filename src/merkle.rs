//! Keccak-256 commitment tree over claim leaves.
//!
//! The tree reproduces the hashing and pairing conventions of the external
//! claim verifier exactly: leaf hashes are deduplicated through a set and
//! sorted ascending, parents hash the byte-wise sorted concatenation of
//! their children, and an odd tail node carries forward unchanged into the
//! next layer. Because sorting and deduplication act on hashes rather than
//! on the original tuples, two distinct leaves with identical hashes would
//! collapse into one tree entry; this is an accepted-probability assumption
//! of keccak256, not a handled condition.

use crate::account::Account;
use crate::error::SnapshotError;
use sha3::{Digest, Keccak256};
use std::collections::BTreeSet;

/// Byte length of a packed claim leaf: `uint256 || address || uint256`.
pub const LEAF_ENCODING_LEN: usize = 84;

/// Computes the keccak256 digest of `bytes`.
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn u256_from_u64(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

fn u256_from_u128(value: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Packs a claim leaf as the verifier expects:
/// `uint256(index) || address(account) || uint256(amount)`, big-endian.
pub fn encode_leaf(index: u64, account: &Account, amount: u128) -> [u8; LEAF_ENCODING_LEN] {
    let mut data = [0u8; LEAF_ENCODING_LEN];
    data[..32].copy_from_slice(&u256_from_u64(index));
    data[32..52].copy_from_slice(account.as_bytes());
    data[52..].copy_from_slice(&u256_from_u128(amount));
    data
}

/// Hashes a packed claim leaf into its 32-byte tree entry.
pub fn leaf_hash(index: u64, account: &Account, amount: u128) -> [u8; 32] {
    keccak256(&encode_leaf(index, account, amount))
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 64];
    if left <= right {
        data[..32].copy_from_slice(left);
        data[32..].copy_from_slice(right);
    } else {
        data[..32].copy_from_slice(right);
        data[32..].copy_from_slice(left);
    }
    keccak256(&data)
}

/// Binary hash tree committing to a deduplicated, hash-sorted leaf set.
#[derive(Debug, Clone)]
pub struct CommitmentTree {
    layers: Vec<Vec<[u8; 32]>>,
}

impl CommitmentTree {
    /// Builds the tree bottom-up from leaf hashes.
    ///
    /// Input order is irrelevant: hashes are deduplicated and sorted before
    /// the first pairing, so any permutation of the same set commits to the
    /// same root. An empty set cannot be committed.
    pub fn build(leaf_hashes: impl IntoIterator<Item = [u8; 32]>) -> Result<Self, SnapshotError> {
        let canonical: BTreeSet<[u8; 32]> = leaf_hashes.into_iter().collect();
        if canonical.is_empty() {
            return Err(SnapshotError::EmptyLeaves);
        }
        let mut layers = vec![canonical.into_iter().collect::<Vec<_>>()];
        while layers.last().map(Vec::len).unwrap_or(0) > 1 {
            let layer = layers.last().cloned().unwrap_or_default();
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            for chunk in layer.chunks(2) {
                if chunk.len() == 1 {
                    // Odd tail: carried forward unchanged, no sibling here.
                    next.push(chunk[0]);
                } else {
                    next.push(hash_pair(&chunk[0], &chunk[1]));
                }
            }
            layers.push(next);
        }
        Ok(CommitmentTree { layers })
    }

    /// The committed root hash.
    pub fn root(&self) -> [u8; 32] {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or_default()
    }

    /// Number of distinct leaves committed to.
    pub fn leaf_count(&self) -> usize {
        self.layers.first().map(Vec::len).unwrap_or(0)
    }

    /// Ordered sibling path proving `leaf` up to (but excluding) the root.
    ///
    /// Layers where the walked node is a carried odd tail contribute no
    /// sibling, so a proof can be shorter than `ceil(log2(n))`. A missing
    /// leaf fails this request only; the tree and other proofs stay usable.
    pub fn proof_of(&self, leaf: &[u8; 32]) -> Result<Vec<[u8; 32]>, SnapshotError> {
        let base = &self.layers[0];
        let mut idx = base
            .binary_search(leaf)
            .map_err(|_| SnapshotError::MissingLeaf {
                leaf: hex::encode(leaf),
            })?;
        let mut proof = Vec::new();
        for layer in self.layers.iter().take(self.layers.len().saturating_sub(1)) {
            let sibling = idx ^ 1;
            if sibling < layer.len() {
                proof.push(layer[sibling]);
            }
            idx /= 2;
        }
        Ok(proof)
    }
}

/// Recombines a proof with the same sort-before-concatenate rule and checks
/// it lands on `root`.
pub fn verify_proof(leaf: &[u8; 32], proof: &[[u8; 32]], root: &[u8; 32]) -> bool {
    let mut computed = *leaf;
    for sibling in proof {
        computed = hash_pair(&computed, sibling);
    }
    computed == *root
}
