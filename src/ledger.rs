//! Per-asset balance ledgers and the sum-preserving aggregator.
//!
//! A [`BalanceMap`] holds one ledger per asset, each mapping accounts to
//! non-negative integer amounts. Absent entries are zero. Maps are produced
//! fresh by every pipeline stage and never mutated after being handed to the
//! next stage; ordered maps pin the iteration order so every run enumerates
//! accounts identically.

use crate::account::Account;
use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Tag identifying which ledger an amount belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetSymbol(String);

impl AssetSymbol {
    /// Creates a symbol from any string-like value.
    pub fn new(symbol: impl Into<String>) -> Self {
        AssetSymbol(symbol.into())
    }

    /// Returns the symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetSymbol {
    fn from(symbol: &str) -> Self {
        AssetSymbol(symbol.to_string())
    }
}

/// Immutable table of per-asset account balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceMap(BTreeMap<AssetSymbol, BTreeMap<Account, u128>>);

impl BalanceMap {
    /// Creates an empty balance map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no asset holds any entry.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Returns the balance for `account` under `asset`, zero when absent.
    pub fn amount(&self, asset: &AssetSymbol, account: &Account) -> u128 {
        self.0
            .get(asset)
            .and_then(|ledger| ledger.get(account))
            .copied()
            .unwrap_or(0)
    }

    /// Returns one asset's ledger when present.
    pub fn ledger(&self, asset: &AssetSymbol) -> Option<&BTreeMap<Account, u128>> {
        self.0.get(asset)
    }

    /// Iterates the per-asset ledgers in symbol order.
    pub fn ledgers(&self) -> impl Iterator<Item = (&AssetSymbol, &BTreeMap<Account, u128>)> {
        self.0.iter()
    }

    /// Replaces one asset's ledger wholesale.
    pub fn set_ledger(&mut self, asset: AssetSymbol, ledger: BTreeMap<Account, u128>) {
        self.0.insert(asset, ledger);
    }

    /// Adds `amount` to `account` under `asset` with checked arithmetic.
    pub fn credit(
        &mut self,
        asset: &AssetSymbol,
        account: Account,
        amount: u128,
    ) -> Result<(), SnapshotError> {
        let slot = self
            .0
            .entry(asset.clone())
            .or_default()
            .entry(account)
            .or_insert(0);
        *slot = slot
            .checked_add(amount)
            .ok_or_else(|| SnapshotError::Overflow {
                context: format!("crediting {account} under {asset}"),
            })?;
        Ok(())
    }

    /// Sums one asset's ledger by full summation with checked arithmetic.
    pub fn asset_total(&self, asset: &AssetSymbol) -> Result<u128, SnapshotError> {
        let mut total: u128 = 0;
        if let Some(ledger) = self.0.get(asset) {
            for amount in ledger.values() {
                total = total
                    .checked_add(*amount)
                    .ok_or_else(|| SnapshotError::Overflow {
                        context: format!("summing ledger {asset}"),
                    })?;
            }
        }
        Ok(total)
    }

    /// Sums one account's balances across every asset.
    pub fn account_total(&self, account: &Account) -> Result<u128, SnapshotError> {
        let mut total: u128 = 0;
        for ledger in self.0.values() {
            if let Some(amount) = ledger.get(account) {
                total = total
                    .checked_add(*amount)
                    .ok_or_else(|| SnapshotError::Overflow {
                        context: format!("summing balances of {account}"),
                    })?;
            }
        }
        Ok(total)
    }

    /// Returns the union of accounts appearing under any asset.
    pub fn accounts(&self) -> BTreeSet<Account> {
        self.0
            .values()
            .flat_map(|ledger| ledger.keys().copied())
            .collect()
    }

    /// Loads a balance map artifact from JSON.
    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|err| format!("failed to read balances {}: {err}", path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| format!("invalid balances artifact {}: {err}", path.display()))
    }

    /// Persists the balance map as a pretty-printed JSON artifact.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| format!("failed to encode balances artifact: {err}"))?;
        std::fs::write(path, bytes)
            .map_err(|err| format!("failed to write {}: {err}", path.display()))
    }
}

/// Merges two balance maps by per-account addition, treating absent entries
/// as zero, and checks per asset that the merge preserved the input sums.
///
/// The sum check is computed by independent full summation rather than
/// assumed from the additions; any account-key mismatch between sources
/// would otherwise under- or over-count silently. A failed check aborts the
/// stage with [`SnapshotError::SumMismatch`].
pub fn merge(a: &BalanceMap, b: &BalanceMap, stage: &str) -> Result<BalanceMap, SnapshotError> {
    let mut merged = a.clone();
    for (asset, ledger) in b.ledgers() {
        for (account, amount) in ledger {
            merged.credit(asset, *account, *amount)?;
        }
    }

    let assets: BTreeSet<&AssetSymbol> = a.0.keys().chain(b.0.keys()).collect();
    for asset in assets {
        let expected = a
            .asset_total(asset)?
            .checked_add(b.asset_total(asset)?)
            .ok_or_else(|| SnapshotError::Overflow {
                context: format!("summing inputs of {stage} for {asset}"),
            })?;
        let actual = merged.asset_total(asset)?;
        if actual != expected {
            return Err(SnapshotError::SumMismatch {
                asset: asset.to_string(),
                stage: stage.to_string(),
                expected,
                actual,
            });
        }
    }
    Ok(merged)
}
