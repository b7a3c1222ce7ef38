#![deny(missing_docs)]

//! # restitution
//!
//! **restitution** reconciles account balances recorded across several
//! related vault ledgers at one fixed historical block, computes each
//! account's proportional entitlement to a compensation pool using exact
//! rational loss ratios, and commits the final per-account amounts into a
//! keccak-256 Merkle tree whose root and per-account proofs are consumable
//! by an independently implemented on-chain claim verifier.
//!
//! The core is a purely functional pipeline over immutable in-memory maps:
//! every merge is checked to preserve sums, legacy share conversion is
//! checked to be monotone, and no floating point participates in any money
//! computation. Retrieval of historical balances lives behind the
//! [`source::BalanceSource`] trait and is the only place where parallelism
//! or retries belong.
//!
//! ## Features
//!
//! * **Sum-preserving aggregation** of per-asset balance maps via
//!   [`ledger::merge`], with independent full-summation checks.
//! * **Legacy share conversion** using an exact rational rate derived from
//!   observed migration totals ([`convert`]).
//! * **Pro-rata loss allocation** and compensation sizing with
//!   arbitrary-precision rational arithmetic ([`allocate`]).
//! * **Verifier-compatible Merkle commitments**: deduplicated, hash-sorted
//!   leaves paired with a sort-before-concatenate keccak256 rule
//!   ([`merkle`]).
//! * **Distribution artifacts** carrying `{index, amount, proof}` claim
//!   records per account ([`distribution`]).
//!
//! ## Usage
//!
//! ```rust
//! use restitution::{build_distribution, Account};
//! use std::collections::BTreeMap;
//!
//! let alice = Account::parse("0x00000000000000000000000000000000000000a1").unwrap();
//! let bob = Account::parse("0x00000000000000000000000000000000000000b2").unwrap();
//! let ledger = BTreeMap::from([(alice, 1_500u128), (bob, 2_000u128)]);
//!
//! let distribution = build_distribution(&ledger).unwrap();
//! assert_eq!(distribution.token_total, "0xdac");
//! assert!(distribution.verify_claim(&alice).is_ok());
//! ```

pub mod account;
pub mod allocate;
pub mod commands;
pub mod config;
pub mod convert;
pub mod distribution;
pub mod error;
pub mod ledger;
pub mod merkle;
pub mod pipeline;
pub mod source;

pub use account::Account;
pub use allocate::{allocate, compensation, LossRatio};
pub use config::{AssetConfig, CompensationConfig, MigrationTotals, SnapshotConfig};
pub use convert::{convert, ConversionRate};
pub use distribution::{build_distribution, Claim, MerkleDistribution};
pub use error::SnapshotError;
pub use ledger::{merge, AssetSymbol, BalanceMap};
pub use merkle::{encode_leaf, keccak256, leaf_hash, verify_proof, CommitmentTree};
pub use pipeline::{SnapshotOutcome, SnapshotPipeline};
pub use source::{balances_from_transfers, fetch_balances, BalanceSource, TransferEvent};
