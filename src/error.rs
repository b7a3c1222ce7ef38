//! Failure taxonomy for the reconciliation and commitment pipeline.
//!
//! Every variant is fatal and non-retryable. Integrity variants mean a
//! checked accounting invariant was violated and the run must stop rather
//! than continue with corrupted results; `Config` and `Source` mean the
//! inputs themselves were unusable. Transient-fault retries belong to the
//! balance source adapter, never to this crate.

use thiserror::Error;

/// Errors raised while reconciling balances or committing distributions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("{asset}: sum mismatch during {stage}: expected {expected}, computed {actual}")]
    /// A merge failed its independent sum-preservation check.
    SumMismatch {
        /// Asset whose totals disagreed.
        asset: String,
        /// Pipeline stage performing the merge.
        stage: String,
        /// Sum of both input maps.
        expected: u128,
        /// Sum recomputed over the merged map.
        actual: u128,
    },
    #[error("{asset}: conversion shrank balance of {account} from {before} to {after}")]
    /// Legacy share conversion produced a smaller balance despite a rate >= 1.
    NonMonotonicConversion {
        /// Asset being converted.
        asset: String,
        /// Account whose balance shrank.
        account: String,
        /// Balance before conversion.
        before: u128,
        /// Balance after conversion.
        after: u128,
    },
    #[error("{asset}: balance of {account} driven below zero during {stage}")]
    /// An account balance would have gone negative.
    NegativeBalance {
        /// Asset whose ledger underflowed.
        asset: String,
        /// Account with the underflowing balance.
        account: String,
        /// Operation that produced the underflow.
        stage: String,
    },
    #[error("zero denominator while deriving {context}")]
    /// A rate or ratio derivation would have divided by zero.
    ZeroDenominator {
        /// What was being derived.
        context: String,
    },
    #[error("leaf {leaf} is not present in the commitment tree")]
    /// Proof was requested for a leaf the tree does not contain.
    MissingLeaf {
        /// Hex digest of the missing leaf hash.
        leaf: String,
    },
    #[error("integer overflow during {context}")]
    /// Checked arithmetic overflowed the amount type.
    Overflow {
        /// Operation that overflowed.
        context: String,
    },
    #[error("cannot commit to an empty leaf set")]
    /// Tree construction was attempted with no leaves.
    EmptyLeaves,
    #[error("generated proof for claim index {index} failed self-verification")]
    /// A freshly generated proof did not recombine to the tree's own root.
    ProofInvalid {
        /// Claim index whose proof failed.
        index: u64,
    },
    #[error("distribution total mismatch: expected {expected}, computed {actual}")]
    /// The distribution total disagreed with the independent summation.
    TotalMismatch {
        /// Total accumulated while building claims.
        expected: u128,
        /// Total recomputed over the input map.
        actual: u128,
    },
    #[error("invalid configuration: {0}")]
    /// The snapshot configuration violated a structural constraint.
    Config(String),
    #[error("balance source failure: {0}")]
    /// The external balance source reported malformed or missing data.
    Source(String),
}

#[cfg(test)]
mod tests {
    use super::SnapshotError;

    #[test]
    fn messages_carry_diagnostic_context() {
        let err = SnapshotError::SumMismatch {
            asset: "vaultA".to_string(),
            stage: "aggregate-current".to_string(),
            expected: 3500,
            actual: 3000,
        };
        let text = err.to_string();
        assert!(text.contains("vaultA"));
        assert!(text.contains("aggregate-current"));
        assert!(text.contains("3500"));
    }
}
