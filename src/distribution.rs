//! Claim table assembly and the persisted distribution artifact.
//!
//! The artifact shape mirrors what the on-chain claim collaborator consumes:
//! a hex `merkleRoot`, a hex `tokenTotal`, and per-account claim records of
//! `{index, amount, proof}`. Indices follow the canonical sorted account
//! enumeration of the finalized ledger, so the committed table is
//! reproducible run-to-run.

use crate::account::Account;
use crate::error::SnapshotError;
use crate::merkle::{leaf_hash, verify_proof, CommitmentTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One account's claim record against the committed root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Position of the account in the canonical enumeration at commit time.
    pub index: u64,
    /// Claimable amount, hex encoded.
    pub amount: String,
    /// Ordered sibling hashes from the leaf's layer up to the root.
    pub proof: Vec<String>,
}

/// Persisted distribution artifact for one ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleDistribution {
    /// Committed root over every claim leaf, hex encoded.
    pub merkle_root: String,
    /// Sum of all claim amounts, hex encoded.
    pub token_total: String,
    /// Claim records keyed by hex account address.
    pub claims: BTreeMap<String, Claim>,
}

fn parse_hash(input: &str) -> Result<[u8; 32], String> {
    let body = input
        .strip_prefix("0x")
        .ok_or_else(|| format!("hash '{input}' is missing the 0x prefix"))?;
    let mut out = [0u8; 32];
    hex::decode_to_slice(body, &mut out).map_err(|err| format!("hash '{input}' is invalid: {err}"))?;
    Ok(out)
}

fn parse_amount(input: &str) -> Result<u128, String> {
    let body = input
        .strip_prefix("0x")
        .ok_or_else(|| format!("amount '{input}' is missing the 0x prefix"))?;
    u128::from_str_radix(body, 16).map_err(|err| format!("amount '{input}' is invalid: {err}"))
}

/// Builds the distribution for one finalized ledger.
///
/// Accounts are enumerated in canonical sorted order to assign indices, the
/// commitment tree is built over the resulting leaves, and every generated
/// proof is re-verified against the root before the artifact is emitted.
/// The emitted total is checked against an independent full summation of
/// the input ledger.
pub fn build_distribution(
    ledger: &BTreeMap<Account, u128>,
) -> Result<MerkleDistribution, SnapshotError> {
    let mut elements = Vec::with_capacity(ledger.len());
    let mut running_total: u128 = 0;
    for (index, (account, amount)) in ledger.iter().enumerate() {
        elements.push((index as u64, *account, *amount));
        running_total = running_total
            .checked_add(*amount)
            .ok_or_else(|| SnapshotError::Overflow {
                context: "summing distribution amounts".to_string(),
            })?;
    }

    let tree = CommitmentTree::build(
        elements
            .iter()
            .map(|(index, account, amount)| leaf_hash(*index, account, *amount)),
    )?;
    let root = tree.root();

    let mut independent: u128 = 0;
    for amount in ledger.values() {
        independent = independent
            .checked_add(*amount)
            .ok_or_else(|| SnapshotError::Overflow {
                context: "re-summing distribution amounts".to_string(),
            })?;
    }
    if independent != running_total {
        return Err(SnapshotError::TotalMismatch {
            expected: running_total,
            actual: independent,
        });
    }

    let mut claims = BTreeMap::new();
    for (index, account, amount) in elements {
        let leaf = leaf_hash(index, &account, amount);
        let proof = tree.proof_of(&leaf)?;
        if !verify_proof(&leaf, &proof, &root) {
            return Err(SnapshotError::ProofInvalid { index });
        }
        claims.insert(
            account.to_string(),
            Claim {
                index,
                amount: format!("{amount:#x}"),
                proof: proof
                    .iter()
                    .map(|sibling| format!("0x{}", hex::encode(sibling)))
                    .collect(),
            },
        );
    }

    Ok(MerkleDistribution {
        merkle_root: format!("0x{}", hex::encode(root)),
        token_total: format!("{running_total:#x}"),
        claims,
    })
}

impl MerkleDistribution {
    /// Re-verifies one account's stored claim against the stored root by
    /// recomputing the leaf hash and walking the proof.
    pub fn verify_claim(&self, account: &Account) -> Result<(), String> {
        let claim = self
            .claims
            .get(&account.to_string())
            .ok_or_else(|| format!("no claim recorded for {account}"))?;
        let amount = parse_amount(&claim.amount)?;
        let leaf = leaf_hash(claim.index, account, amount);
        let root = parse_hash(&self.merkle_root)?;
        let proof = claim
            .proof
            .iter()
            .map(|sibling| parse_hash(sibling))
            .collect::<Result<Vec<_>, _>>()?;
        if verify_proof(&leaf, &proof, &root) {
            Ok(())
        } else {
            Err(format!(
                "claim for {account} does not recombine to root {}",
                self.merkle_root
            ))
        }
    }

    /// Decodes the stored total back into an integer.
    pub fn total(&self) -> Result<u128, String> {
        parse_amount(&self.token_total)
    }

    /// Loads a distribution artifact from JSON.
    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|err| format!("failed to read distribution {}: {err}", path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| format!("invalid distribution artifact {}: {err}", path.display()))
    }

    /// Persists the distribution as a pretty-printed JSON artifact.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| format!("failed to encode distribution artifact: {err}"))?;
        std::fs::write(path, bytes)
            .map_err(|err| format!("failed to write {}: {err}", path.display()))
    }
}
