//! Re-verifies a single claim against a persisted distribution artifact.

use crate::account::Account;
use crate::distribution::MerkleDistribution;
use std::path::Path;

/// Details of a claim that passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedClaim {
    /// Claim index inside the committed enumeration.
    pub index: u64,
    /// Claimable amount, hex encoded.
    pub amount: String,
    /// Number of sibling hashes in the proof.
    pub proof_len: usize,
    /// Root the claim was verified against, hex encoded.
    pub merkle_root: String,
}

/// Loads the distribution at `distribution_path`, recomputes `account`'s
/// leaf hash, and walks the stored proof against the stored root.
pub fn run_verify(distribution_path: &str, account: &str) -> Result<VerifiedClaim, String> {
    let account = Account::parse(account)?;
    let distribution = MerkleDistribution::load(Path::new(distribution_path))?;
    distribution.verify_claim(&account)?;
    let claim = distribution
        .claims
        .get(&account.to_string())
        .ok_or_else(|| format!("no claim recorded for {account}"))?;
    Ok(VerifiedClaim {
        index: claim.index,
        amount: claim.amount.clone(),
        proof_len: claim.proof.len(),
        merkle_root: distribution.merkle_root.clone(),
    })
}
