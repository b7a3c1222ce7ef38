//! Legacy share conversion.
//!
//! Balances denominated in a retired unit are rescaled into the current unit
//! with a single exact rational rate derived from two externally observed
//! totals. Conversion multiplies exactly and truncates toward zero; when the
//! rate is at least one, no balance may shrink, and a shrinking balance is
//! an integrity failure rather than a warning.

use crate::account::Account;
use crate::config::MigrationTotals;
use crate::error::SnapshotError;
use crate::ledger::AssetSymbol;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};
use std::collections::BTreeMap;

/// Truncates a non-negative exact rational toward zero into a `u128`.
pub(crate) fn floor_u128(value: &BigRational, context: &str) -> Result<u128, SnapshotError> {
    value
        .floor()
        .to_integer()
        .to_u128()
        .ok_or_else(|| SnapshotError::Overflow {
            context: context.to_string(),
        })
}

/// Exact rational rate converting legacy-unit shares into current units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRate(BigRational);

impl ConversionRate {
    /// Derives the rate from observed migration totals:
    /// `(current_outstanding − current_migrated) / (legacy_outstanding −
    /// legacy_migrated)`.
    ///
    /// A zero denominator means every legacy share already migrated; the
    /// derivation fails rather than producing an undefined rate.
    pub fn derive(totals: &MigrationTotals) -> Result<Self, SnapshotError> {
        let numerator = totals
            .current_outstanding
            .checked_sub(totals.current_migrated)
            .ok_or_else(|| {
                SnapshotError::Config(format!(
                    "current migrated {} exceeds outstanding {}",
                    totals.current_migrated, totals.current_outstanding
                ))
            })?;
        let denominator = totals
            .legacy_outstanding
            .checked_sub(totals.legacy_migrated)
            .ok_or_else(|| {
                SnapshotError::Config(format!(
                    "legacy migrated {} exceeds outstanding {}",
                    totals.legacy_migrated, totals.legacy_outstanding
                ))
            })?;
        if denominator == 0 {
            return Err(SnapshotError::ZeroDenominator {
                context: "legacy share conversion rate".to_string(),
            });
        }
        Ok(ConversionRate(BigRational::new(
            BigInt::from(numerator),
            BigInt::from(denominator),
        )))
    }

    /// Builds a rate directly from a numerator/denominator pair.
    pub fn from_parts(numerator: u128, denominator: u128) -> Result<Self, SnapshotError> {
        if denominator == 0 {
            return Err(SnapshotError::ZeroDenominator {
                context: "conversion rate".to_string(),
            });
        }
        Ok(ConversionRate(BigRational::new(
            BigInt::from(numerator),
            BigInt::from(denominator),
        )))
    }

    /// The exact rational value of the rate.
    pub fn ratio(&self) -> &BigRational {
        &self.0
    }

    /// Whether the rate is at least one, the expected regime when converting
    /// a deflated legacy unit into an inflated current unit.
    pub fn is_at_least_one(&self) -> bool {
        self.0 >= BigRational::one()
    }
}

/// Rescales every balance in `ledger` by `rate`, truncating toward zero.
///
/// Returns a fresh ledger; the input is never mutated. With a rate of at
/// least one the output is checked to dominate the input per account.
pub fn convert(
    ledger: &BTreeMap<Account, u128>,
    rate: &ConversionRate,
    asset: &AssetSymbol,
) -> Result<BTreeMap<Account, u128>, SnapshotError> {
    let monotone = rate.is_at_least_one();
    let mut converted = BTreeMap::new();
    for (account, amount) in ledger {
        let scaled = BigRational::from_integer(BigInt::from(*amount)) * rate.ratio();
        let rescaled = floor_u128(&scaled, &format!("converting {account} under {asset}"))?;
        if monotone && rescaled < *amount {
            return Err(SnapshotError::NonMonotonicConversion {
                asset: asset.to_string(),
                account: account.to_string(),
                before: *amount,
                after: rescaled,
            });
        }
        converted.insert(*account, rescaled);
    }
    Ok(converted)
}
