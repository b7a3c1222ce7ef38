//! Balance source adapter boundary.
//!
//! Everything that touches a blockchain data source sits behind
//! [`BalanceSource`]; the core pipeline only ever sees already-fetched maps.
//! Both adapter operations are treated as deterministic pure functions of
//! block height, so fetches may run in any order (including in parallel)
//! without affecting the merged result.

use crate::account::Account;
use crate::error::SnapshotError;
use crate::ledger::AssetSymbol;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One token transfer observed in an asset's event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Sending account; the zero address marks a mint.
    pub from: Account,
    /// Receiving account; the zero address marks a burn.
    pub to: Account,
    /// Transferred amount.
    pub amount: u128,
}

/// External supplier of historical balances and transfer logs.
pub trait BalanceSource {
    /// Returns `account`'s balance of `asset` at `block`.
    fn balance_of(
        &self,
        account: &Account,
        asset: &AssetSymbol,
        block: u64,
    ) -> Result<u128, String>;

    /// Returns every transfer of `asset` within the inclusive block range.
    fn transfer_events(
        &self,
        asset: &AssetSymbol,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferEvent>, String>;
}

/// Replays a complete transfer log into per-account balances.
///
/// Transfers from the zero address mint, transfers to it burn. A transfer
/// that would drive any balance below zero means the log is incomplete or
/// inconsistent and aborts the replay. Excluded accounts (pool contracts,
/// the burn address) are removed after the fold, and zero balances are
/// dropped from the result.
pub fn balances_from_transfers(
    asset: &AssetSymbol,
    events: &[TransferEvent],
    exclude: &BTreeSet<Account>,
) -> Result<BTreeMap<Account, u128>, SnapshotError> {
    let mut balances: BTreeMap<Account, u128> = BTreeMap::new();
    for event in events {
        if event.from != Account::ZERO {
            let slot = balances.entry(event.from).or_insert(0);
            *slot = slot
                .checked_sub(event.amount)
                .ok_or_else(|| SnapshotError::NegativeBalance {
                    asset: asset.to_string(),
                    account: event.from.to_string(),
                    stage: "transfer replay".to_string(),
                })?;
        }
        if event.to != Account::ZERO {
            let slot = balances.entry(event.to).or_insert(0);
            *slot = slot
                .checked_add(event.amount)
                .ok_or_else(|| SnapshotError::Overflow {
                    context: format!("crediting {} during transfer replay", event.to),
                })?;
        }
    }
    for account in exclude {
        balances.remove(account);
    }
    balances.retain(|_, amount| *amount > 0);
    Ok(balances)
}

/// Fetches point balances for a set of accounts at one block.
///
/// Lookups fan out across accounts; results land in an ordered map, so
/// completion order cannot influence the output. Zero balances are dropped.
pub fn fetch_balances<S: BalanceSource + Sync>(
    source: &S,
    accounts: &[Account],
    asset: &AssetSymbol,
    block: u64,
) -> Result<BTreeMap<Account, u128>, SnapshotError> {
    let fetched = accounts
        .par_iter()
        .map(|account| {
            source
                .balance_of(account, asset, block)
                .map(|amount| (*account, amount))
                .map_err(SnapshotError::Source)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fetched
        .into_iter()
        .filter(|(_, amount)| *amount > 0)
        .collect())
}
