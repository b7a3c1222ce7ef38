//! Stage orchestration for one reconciliation and commitment run.
//!
//! Stages flow strictly forward: merge the current-unit sources, merge and
//! convert the legacy-unit sources, merge both tracks, allocate losses,
//! size compensation, and commit one distribution per ledger. Every stage
//! is a pure function of its inputs and the immutable configuration, so any
//! stage output can be recomputed (or substituted from a cache kept by the
//! caller) without affecting the result.

use crate::allocate::{allocate, compensation, LossRatio};
use crate::config::SnapshotConfig;
use crate::convert::{convert, ConversionRate};
use crate::distribution::{build_distribution, MerkleDistribution};
use crate::error::SnapshotError;
use crate::ledger::{merge, AssetSymbol, BalanceMap};
use std::collections::BTreeMap;

/// Everything produced by one full pipeline run.
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    /// Final reconciled share balances per asset.
    pub reconciled: BalanceMap,
    /// Per-asset lost amounts per account.
    pub losses: BalanceMap,
    /// Compensation-token and return amounts per account.
    pub amounts: BalanceMap,
    /// One committed distribution per ledger in the final table.
    pub distributions: BTreeMap<AssetSymbol, MerkleDistribution>,
}

/// Reconciliation and commitment pipeline bound to one configuration.
#[derive(Debug, Clone)]
pub struct SnapshotPipeline {
    config: SnapshotConfig,
}

impl SnapshotPipeline {
    /// Validates the configuration and binds the pipeline to it.
    pub fn new(config: SnapshotConfig) -> Result<Self, SnapshotError> {
        config.validate()?;
        Ok(SnapshotPipeline { config })
    }

    /// The configuration this pipeline runs under.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    fn fold(maps: &[BalanceMap], stage: &str) -> Result<BalanceMap, SnapshotError> {
        let mut folded = BalanceMap::new();
        for map in maps {
            folded = merge(&folded, map, stage)?;
        }
        Ok(folded)
    }

    /// Merges every balance source and rescales legacy-unit balances into
    /// current units before the final cross-track merge.
    pub fn reconcile(
        &self,
        current: &[BalanceMap],
        legacy: &[BalanceMap],
    ) -> Result<BalanceMap, SnapshotError> {
        let current_merged = Self::fold(current, "aggregate-current")?;
        let legacy_merged = Self::fold(legacy, "aggregate-legacy")?;

        let mut converted = BalanceMap::new();
        for (asset, ledger) in legacy_merged.ledgers() {
            if ledger.is_empty() {
                continue;
            }
            let asset_config = self.config.asset(asset).ok_or_else(|| {
                SnapshotError::Config(format!("legacy balances found for unconfigured asset {asset}"))
            })?;
            let totals = asset_config.migration.as_ref().ok_or_else(|| {
                SnapshotError::Config(format!(
                    "legacy balances found for {asset} but no migration totals are configured"
                ))
            })?;
            let rate = ConversionRate::derive(totals)?;
            converted.set_ledger(asset.clone(), convert(ledger, &rate, asset)?);
        }

        merge(&current_merged, &converted, "merge-legacy-current")
    }

    /// Allocates each asset's observed loss across its reconciled holders.
    pub fn allocate_losses(&self, balances: &BalanceMap) -> Result<BalanceMap, SnapshotError> {
        let mut losses = BalanceMap::new();
        for (asset, ledger) in balances.ledgers() {
            let asset_config = self.config.asset(asset).ok_or_else(|| {
                SnapshotError::Config(format!("no configuration for asset {asset}"))
            })?;
            let ratio = LossRatio::derive(
                asset_config.underlying_before,
                asset_config.underlying_after,
            )?;
            let allocated = allocate(
                ledger,
                asset_config.underlying_before,
                asset_config.total_shares,
                &ratio,
                asset,
            )?;
            losses.set_ledger(asset.clone(), allocated);
        }
        Ok(losses)
    }

    /// Sizes compensation-token and return-pool amounts from the losses.
    pub fn compensation_amounts(&self, losses: &BalanceMap) -> Result<BalanceMap, SnapshotError> {
        let aggregate_loss = self.config.aggregate_observed_loss()?;
        let pool_total = self.config.compensation_pool()?;
        let return_pools: Vec<(AssetSymbol, u128)> = self
            .config
            .assets
            .iter()
            .map(|asset| (asset.symbol.clone(), asset.return_pool))
            .collect();
        compensation(
            losses,
            aggregate_loss,
            pool_total,
            &return_pools,
            &self.config.compensation.symbol,
            self.config.compensation.scale_exponent,
        )
    }

    /// Commits one distribution per non-empty ledger in the final table.
    pub fn build_distributions(
        &self,
        amounts: &BalanceMap,
    ) -> Result<BTreeMap<AssetSymbol, MerkleDistribution>, SnapshotError> {
        let mut distributions = BTreeMap::new();
        for (asset, ledger) in amounts.ledgers() {
            if ledger.is_empty() {
                continue;
            }
            distributions.insert(asset.clone(), build_distribution(ledger)?);
        }
        Ok(distributions)
    }

    /// Runs the whole chain over the supplied balance sources.
    pub fn run(
        &self,
        current: &[BalanceMap],
        legacy: &[BalanceMap],
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let reconciled = self.reconcile(current, legacy)?;
        let losses = self.allocate_losses(&reconciled)?;
        let amounts = self.compensation_amounts(&losses)?;
        let distributions = self.build_distributions(&amounts)?;
        Ok(SnapshotOutcome {
            reconciled,
            losses,
            amounts,
            distributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SnapshotPipeline;
    use crate::account::Account;
    use crate::config::{AssetConfig, CompensationConfig, MigrationTotals, SnapshotConfig};
    use crate::ledger::{AssetSymbol, BalanceMap};

    fn account(n: u8) -> Account {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Account::from_bytes(bytes)
    }

    fn test_config() -> SnapshotConfig {
        SnapshotConfig {
            snapshot_block: 11_129_473,
            compensation: CompensationConfig {
                symbol: AssetSymbol::from("IOU"),
                scale_exponent: 12,
            },
            assets: vec![
                AssetConfig {
                    symbol: AssetSymbol::from("vaultA"),
                    underlying_before: 1_000_000,
                    underlying_after: 750_000,
                    total_shares: 1_000,
                    return_pool: 50_000,
                    migration: Some(MigrationTotals {
                        legacy_outstanding: 150,
                        legacy_migrated: 50,
                        current_outstanding: 260,
                        current_migrated: 60,
                    }),
                },
                AssetConfig {
                    symbol: AssetSymbol::from("vaultB"),
                    underlying_before: 500_000,
                    underlying_after: 400_000,
                    total_shares: 500,
                    return_pool: 30_000,
                    migration: None,
                },
            ],
        }
    }

    fn current_sources() -> Vec<BalanceMap> {
        let vault_a = AssetSymbol::from("vaultA");
        let vault_b = AssetSymbol::from("vaultB");
        let mut holders = BalanceMap::new();
        holders.credit(&vault_a, account(1), 100).unwrap();
        holders.credit(&vault_b, account(1), 50).unwrap();
        let mut stakers = BalanceMap::new();
        stakers.credit(&vault_a, account(2), 300).unwrap();
        vec![holders, stakers]
    }

    fn legacy_sources() -> Vec<BalanceMap> {
        let vault_a = AssetSymbol::from("vaultA");
        let mut legacy = BalanceMap::new();
        legacy.credit(&vault_a, account(3), 50).unwrap();
        vec![legacy]
    }

    #[test]
    fn reconcile_converts_legacy_shares_before_merging() {
        let pipeline = SnapshotPipeline::new(test_config()).unwrap();
        let reconciled = pipeline
            .reconcile(&current_sources(), &legacy_sources())
            .unwrap();

        let vault_a = AssetSymbol::from("vaultA");
        // Conversion rate (260 - 60) / (150 - 50) = 2, so 50 legacy -> 100.
        assert_eq!(reconciled.amount(&vault_a, &account(3)), 100);
        assert_eq!(reconciled.asset_total(&vault_a).unwrap(), 500);
    }

    #[test]
    fn losses_follow_prorata_underlying_value() {
        let pipeline = SnapshotPipeline::new(test_config()).unwrap();
        let reconciled = pipeline
            .reconcile(&current_sources(), &legacy_sources())
            .unwrap();
        let losses = pipeline.allocate_losses(&reconciled).unwrap();

        let vault_a = AssetSymbol::from("vaultA");
        let vault_b = AssetSymbol::from("vaultB");
        // vaultA: prorata = 1_000_000 * bal / 1_000, ratio 1/4 -> 250 * bal.
        assert_eq!(losses.amount(&vault_a, &account(1)), 25_000);
        assert_eq!(losses.amount(&vault_a, &account(2)), 75_000);
        assert_eq!(losses.amount(&vault_a, &account(3)), 25_000);
        // vaultB: prorata = 500_000 * 50 / 500, ratio 1/5 -> 10_000.
        assert_eq!(losses.amount(&vault_b, &account(1)), 10_000);
    }

    #[test]
    fn compensation_spans_assets_and_scales_the_pool() {
        let pipeline = SnapshotPipeline::new(test_config()).unwrap();
        let outcome = pipeline
            .run(&current_sources(), &legacy_sources())
            .unwrap();

        let iou = AssetSymbol::from("IOU");
        let vault_a = AssetSymbol::from("vaultA");
        let vault_b = AssetSymbol::from("vaultB");

        // Aggregate observed loss 350_000; pool 350_000 - 80_000 = 270_000.
        // account(1) lost 35_000 -> ratio 1/10.
        assert_eq!(
            outcome.amounts.amount(&iou, &account(1)),
            27_000 * 10u128.pow(12)
        );
        assert_eq!(outcome.amounts.amount(&vault_a, &account(1)), 5_000);
        assert_eq!(outcome.amounts.amount(&vault_b, &account(1)), 3_000);

        // account(3) lost 25_000 -> ratio 1/14, floored after scaling.
        assert_eq!(
            outcome.amounts.amount(&iou, &account(3)),
            270_000 * 10u128.pow(12) / 14
        );
        assert_eq!(outcome.amounts.amount(&vault_a, &account(3)), 50_000 / 14);
    }

    #[test]
    fn run_commits_one_distribution_per_ledger() {
        let pipeline = SnapshotPipeline::new(test_config()).unwrap();
        let outcome = pipeline
            .run(&current_sources(), &legacy_sources())
            .unwrap();

        assert_eq!(outcome.distributions.len(), 3);
        for (asset, distribution) in &outcome.distributions {
            assert_eq!(
                distribution.total().unwrap(),
                outcome.amounts.asset_total(asset).unwrap()
            );
            for account in outcome.amounts.accounts() {
                distribution.verify_claim(&account).unwrap();
            }
        }
    }

    #[test]
    fn legacy_balances_require_migration_totals() {
        let mut config = test_config();
        config.assets[0].migration = None;
        let pipeline = SnapshotPipeline::new(config).unwrap();
        let err = pipeline
            .reconcile(&current_sources(), &legacy_sources())
            .unwrap_err();
        assert!(err.to_string().contains("migration totals"));
    }

    #[test]
    fn stages_never_mutate_their_inputs() {
        let pipeline = SnapshotPipeline::new(test_config()).unwrap();
        let current = current_sources();
        let legacy = legacy_sources();
        let before = (current.clone(), legacy.clone());
        let reconciled = pipeline.reconcile(&current, &legacy).unwrap();
        let _ = pipeline.allocate_losses(&reconciled).unwrap();
        assert_eq!((current, legacy), before);
    }
}
