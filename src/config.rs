//! Immutable snapshot configuration.
//!
//! The observed totals that drive rate and ratio derivation are supplied
//! here as one explicit value passed into the pipeline at construction time,
//! not read from module-level constants. All totals are point-in-time
//! observations taken externally at the snapshot and end blocks; this crate
//! never recomputes them.

use crate::error::SnapshotError;
use crate::ledger::AssetSymbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Observed migration totals used to derive a legacy share conversion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTotals {
    /// Legacy-unit shares outstanding at the snapshot block.
    pub legacy_outstanding: u128,
    /// Legacy-unit shares already migrated at the snapshot block.
    pub legacy_migrated: u128,
    /// Current-unit shares outstanding at the snapshot block.
    pub current_outstanding: u128,
    /// Current-unit shares already migrated at the snapshot block.
    pub current_migrated: u128,
}

/// Per-asset observations for loss allocation and return distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Ledger tag for this asset track.
    pub symbol: AssetSymbol,
    /// Underlying value held by the vault at the snapshot block.
    pub underlying_before: u128,
    /// Underlying value held by the vault at the post-incident end block.
    pub underlying_after: u128,
    /// Vault share supply at the snapshot block.
    pub total_shares: u128,
    /// Returned funds earmarked for this asset's direct distribution.
    pub return_pool: u128,
    /// Migration totals, present only for assets with a retired legacy unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationTotals>,
}

impl AssetConfig {
    /// Underlying value destroyed between the snapshot and end blocks.
    pub fn observed_loss(&self) -> Result<u128, SnapshotError> {
        self.underlying_before
            .checked_sub(self.underlying_after)
            .ok_or_else(|| {
                SnapshotError::Config(format!(
                    "{}: underlying_after {} exceeds underlying_before {}",
                    self.symbol, self.underlying_after, self.underlying_before
                ))
            })
    }
}

/// Compensation token parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationConfig {
    /// Ledger tag for the compensation token.
    pub symbol: AssetSymbol,
    /// Base-ten exponent bridging the asset and compensation token
    /// denominations (12 bridges a 6-decimal asset to an 18-decimal token).
    pub scale_exponent: u32,
}

/// Complete configuration for one snapshot reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Block height at which every balance is read.
    pub snapshot_block: u64,
    /// Compensation token parameters.
    pub compensation: CompensationConfig,
    /// The asset tracks participating in this run.
    pub assets: Vec<AssetConfig>,
}

impl SnapshotConfig {
    /// Checks structural constraints, returning the first violation.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.assets.is_empty() {
            return Err(SnapshotError::Config(
                "at least one asset must be configured".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for asset in &self.assets {
            if !seen.insert(&asset.symbol) {
                return Err(SnapshotError::Config(format!(
                    "duplicate asset symbol {}",
                    asset.symbol
                )));
            }
            if asset.symbol == self.compensation.symbol {
                return Err(SnapshotError::Config(format!(
                    "asset symbol {} collides with the compensation symbol",
                    asset.symbol
                )));
            }
            asset.observed_loss()?;
        }
        self.compensation_pool()?;
        Ok(())
    }

    /// Looks up one asset's configuration by symbol.
    pub fn asset(&self, symbol: &AssetSymbol) -> Option<&AssetConfig> {
        self.assets.iter().find(|asset| &asset.symbol == symbol)
    }

    /// Observed loss summed across every configured asset.
    pub fn aggregate_observed_loss(&self) -> Result<u128, SnapshotError> {
        let mut total: u128 = 0;
        for asset in &self.assets {
            total = total
                .checked_add(asset.observed_loss()?)
                .ok_or_else(|| SnapshotError::Overflow {
                    context: "summing observed losses".to_string(),
                })?;
        }
        Ok(total)
    }

    /// Returned funds summed across every configured asset.
    pub fn total_returned(&self) -> Result<u128, SnapshotError> {
        let mut total: u128 = 0;
        for asset in &self.assets {
            total = total
                .checked_add(asset.return_pool)
                .ok_or_else(|| SnapshotError::Overflow {
                    context: "summing return pools".to_string(),
                })?;
        }
        Ok(total)
    }

    /// Compensation token pool: aggregate loss not covered by returned funds.
    pub fn compensation_pool(&self) -> Result<u128, SnapshotError> {
        let loss = self.aggregate_observed_loss()?;
        let returned = self.total_returned()?;
        loss.checked_sub(returned).ok_or_else(|| {
            SnapshotError::Config(format!(
                "returned funds {returned} exceed aggregate loss {loss}"
            ))
        })
    }

    /// Loads a configuration artifact from JSON and validates it.
    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
        let config: SnapshotConfig = serde_json::from_slice(&bytes)
            .map_err(|err| format!("invalid config {}: {err}", path.display()))?;
        config
            .validate()
            .map_err(|err| format!("config {} rejected: {err}", path.display()))?;
        Ok(config)
    }

    /// Persists the configuration as a pretty-printed JSON artifact.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| format!("failed to encode config: {err}"))?;
        std::fs::write(path, bytes)
            .map_err(|err| format!("failed to write {}: {err}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetConfig, CompensationConfig, MigrationTotals, SnapshotConfig};
    use crate::ledger::AssetSymbol;

    fn sample_config() -> SnapshotConfig {
        SnapshotConfig {
            snapshot_block: 11_129_473,
            compensation: CompensationConfig {
                symbol: AssetSymbol::from("IOU"),
                scale_exponent: 12,
            },
            assets: vec![
                AssetConfig {
                    symbol: AssetSymbol::from("vaultA"),
                    underlying_before: 125_037_466_425_427,
                    underlying_after: 106_495_599_908_200,
                    total_shares: 110_000_000_000_000,
                    return_pool: 1_761_898_396_474,
                    migration: Some(MigrationTotals {
                        legacy_outstanding: 2_000,
                        legacy_migrated: 500,
                        current_outstanding: 3_300,
                        current_migrated: 300,
                    }),
                },
                AssetConfig {
                    symbol: AssetSymbol::from("vaultB"),
                    underlying_before: 108_630_659_968_404,
                    underlying_after: 93_753_096_807_272,
                    total_shares: 100_000_000_000_000,
                    return_pool: 718_914_048_541,
                    migration: None,
                },
            ],
        }
    }

    #[test]
    fn sample_validates_and_derives_totals() {
        let config = sample_config();
        config.validate().unwrap();
        assert_eq!(
            config.aggregate_observed_loss().unwrap(),
            18_541_866_517_227 + 14_877_563_161_132
        );
        assert_eq!(
            config.compensation_pool().unwrap(),
            18_541_866_517_227 + 14_877_563_161_132 - 1_761_898_396_474 - 718_914_048_541
        );
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let mut config = sample_config();
        config.assets[1].symbol = AssetSymbol::from("vaultA");
        assert!(config.validate().is_err());
    }

    #[test]
    fn growth_instead_of_loss_is_rejected() {
        let mut config = sample_config();
        config.assets[0].underlying_after = config.assets[0].underlying_before + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn compensation_symbol_collision_is_rejected() {
        let mut config = sample_config();
        config.compensation.symbol = AssetSymbol::from("vaultB");
        assert!(config.validate().is_err());
    }

    #[test]
    fn serde_roundtrip_preserves_config() {
        let config = sample_config();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: SnapshotConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
