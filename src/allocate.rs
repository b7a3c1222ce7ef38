//! Pro-rata loss allocation and compensation sizing.
//!
//! Each account's share of an observed aggregate loss is computed with exact
//! rational arithmetic and floored per account. The sum of floored losses
//! may fall slightly short of the observed aggregate; that residual is a
//! documented property of per-account truncation and is never redistributed
//! or rounded globally.

use crate::account::Account;
use crate::convert::floor_u128;
use crate::error::SnapshotError;
use crate::ledger::{AssetSymbol, BalanceMap};
use num_bigint::BigInt;
use num_rational::BigRational;
use std::collections::BTreeMap;

/// Fraction of an asset's snapshot-time underlying value that was lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossRatio(BigRational);

impl LossRatio {
    /// Derives `(before − after) / before` from two observed underlying
    /// totals. The result lies in `[0, 1)` for any genuine partial loss.
    pub fn derive(underlying_before: u128, underlying_after: u128) -> Result<Self, SnapshotError> {
        let lost = underlying_before
            .checked_sub(underlying_after)
            .ok_or_else(|| {
                SnapshotError::Config(format!(
                    "underlying grew from {underlying_before} to {underlying_after}; no loss to allocate"
                ))
            })?;
        if underlying_before == 0 {
            return Err(SnapshotError::ZeroDenominator {
                context: "loss ratio".to_string(),
            });
        }
        Ok(LossRatio(BigRational::new(
            BigInt::from(lost),
            BigInt::from(underlying_before),
        )))
    }

    /// Builds a ratio directly from a numerator/denominator pair.
    pub fn from_parts(numerator: u128, denominator: u128) -> Result<Self, SnapshotError> {
        if denominator == 0 {
            return Err(SnapshotError::ZeroDenominator {
                context: "loss ratio".to_string(),
            });
        }
        Ok(LossRatio(BigRational::new(
            BigInt::from(numerator),
            BigInt::from(denominator),
        )))
    }

    /// The exact rational value of the ratio.
    pub fn ratio(&self) -> &BigRational {
        &self.0
    }
}

/// Allocates each account's floored share of the asset's lost value.
///
/// Per account the pro-rata underlying value is
/// `underlying_total * balance / total_shares`, kept rational until the
/// final `floor(prorata * ratio)`. Accounts flooring to zero keep their
/// entry; every holder of the asset receives a loss record.
pub fn allocate(
    ledger: &BTreeMap<Account, u128>,
    underlying_total: u128,
    total_shares: u128,
    ratio: &LossRatio,
    asset: &AssetSymbol,
) -> Result<BTreeMap<Account, u128>, SnapshotError> {
    if total_shares == 0 {
        return Err(SnapshotError::ZeroDenominator {
            context: format!("pro-rata share of {asset}"),
        });
    }
    let shares = BigInt::from(total_shares);
    let underlying = BigInt::from(underlying_total);
    let mut losses = BTreeMap::new();
    for (account, balance) in ledger {
        let prorata = BigRational::new(underlying.clone() * BigInt::from(*balance), shares.clone());
        let lost = floor_u128(
            &(prorata * ratio.ratio()),
            &format!("loss of {account} under {asset}"),
        )?;
        losses.insert(*account, lost);
    }
    Ok(losses)
}

/// Converts per-asset losses into compensation-token and return amounts.
///
/// Each account's ratio is its total loss across assets over the observed
/// aggregate loss. The compensation-token amount scales the pool by the
/// ratio and by `10^scale_exponent` to bridge denominations before the
/// final truncation; return-pool amounts scale without the exponent.
pub fn compensation(
    losses: &BalanceMap,
    aggregate_loss: u128,
    pool_total: u128,
    return_pools: &[(AssetSymbol, u128)],
    compensation_symbol: &AssetSymbol,
    scale_exponent: u32,
) -> Result<BalanceMap, SnapshotError> {
    if aggregate_loss == 0 {
        return Err(SnapshotError::ZeroDenominator {
            context: "compensation ratio".to_string(),
        });
    }
    let aggregate = BigInt::from(aggregate_loss);
    let scale = num_traits::pow(BigInt::from(10u8), scale_exponent as usize);
    let pool = BigInt::from(pool_total);

    let mut amounts = BalanceMap::new();
    for account in losses.accounts() {
        let account_loss = losses.account_total(&account)?;
        let ratio = BigRational::new(BigInt::from(account_loss), aggregate.clone());
        let scaled = BigRational::from_integer(pool.clone() * scale.clone()) * ratio.clone();
        let token_amount = floor_u128(
            &scaled,
            &format!("compensation amount of {account}"),
        )?;
        amounts.credit(compensation_symbol, account, token_amount)?;
        for (symbol, return_pool) in return_pools {
            let returned = floor_u128(
                &(BigRational::from_integer(BigInt::from(*return_pool)) * ratio.clone()),
                &format!("return amount of {account} under {symbol}"),
            )?;
            amounts.credit(symbol, account, returned)?;
        }
    }
    Ok(amounts)
}
