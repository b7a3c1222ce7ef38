//! Runs the full reconciliation pipeline and writes distribution artifacts.

use crate::config::SnapshotConfig;
use crate::ledger::BalanceMap;
use crate::pipeline::SnapshotPipeline;
use std::path::Path;

/// Summary of one committed distribution.
#[derive(Debug, Clone)]
pub struct DistributionSummary {
    /// Ledger the distribution commits to.
    pub symbol: String,
    /// Committed Merkle root, hex encoded.
    pub merkle_root: String,
    /// Total claimable amount, hex encoded.
    pub token_total: String,
    /// Number of claim records.
    pub claim_count: usize,
    /// Path the artifact was written to.
    pub path: String,
}

fn load_maps(paths: &[String]) -> Result<Vec<BalanceMap>, String> {
    paths
        .iter()
        .map(|path| BalanceMap::load(Path::new(path)))
        .collect()
}

/// Runs the pipeline over the given balance artifacts and writes one
/// distribution JSON per ledger into `output_dir`.
pub fn run_distribute(
    config_path: &str,
    current_paths: &[String],
    legacy_paths: &[String],
    output_dir: &str,
) -> Result<Vec<DistributionSummary>, String> {
    if current_paths.is_empty() && legacy_paths.is_empty() {
        return Err("at least one balances artifact is required".to_string());
    }

    let config = SnapshotConfig::load(Path::new(config_path))?;
    let pipeline =
        SnapshotPipeline::new(config).map_err(|err| format!("pipeline rejected config: {err}"))?;

    let current = load_maps(current_paths)?;
    let legacy = load_maps(legacy_paths)?;

    let outcome = pipeline
        .run(&current, &legacy)
        .map_err(|err| format!("pipeline run failed: {err}"))?;

    let mut summaries = Vec::with_capacity(outcome.distributions.len());
    for (symbol, distribution) in &outcome.distributions {
        let path = Path::new(output_dir).join(format!("{symbol}-distribution.json"));
        distribution.save(&path)?;
        summaries.push(DistributionSummary {
            symbol: symbol.to_string(),
            merkle_root: distribution.merkle_root.clone(),
            token_total: distribution.token_total.clone(),
            claim_count: distribution.claims.len(),
            path: path.display().to_string(),
        });
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::run_distribute;
    use crate::account::Account;
    use crate::config::{AssetConfig, CompensationConfig, SnapshotConfig};
    use crate::distribution::MerkleDistribution;
    use crate::ledger::{AssetSymbol, BalanceMap};
    use std::fs;
    use std::path::Path;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        p.push(format!("{name}_{ts}"));
        p
    }

    fn account(n: u8) -> Account {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Account::from_bytes(bytes)
    }

    #[test]
    fn distribute_writes_verifiable_artifacts() {
        let config_path = temp_path("config.json");
        let balances_path = temp_path("balances.json");
        let out_dir = temp_path("distributions");

        let config = SnapshotConfig {
            snapshot_block: 100,
            compensation: CompensationConfig {
                symbol: AssetSymbol::from("IOU"),
                scale_exponent: 12,
            },
            assets: vec![AssetConfig {
                symbol: AssetSymbol::from("vaultA"),
                underlying_before: 1_000_000,
                underlying_after: 750_000,
                total_shares: 1_000,
                return_pool: 50_000,
                migration: None,
            }],
        };
        config.save(&config_path).unwrap();

        let mut balances = BalanceMap::new();
        let asset = AssetSymbol::from("vaultA");
        balances.credit(&asset, account(1), 100).unwrap();
        balances.credit(&asset, account(2), 300).unwrap();
        balances.save(&balances_path).unwrap();

        let summaries = run_distribute(
            config_path.to_str().unwrap(),
            &[balances_path.display().to_string()],
            &[],
            out_dir.to_str().unwrap(),
        )
        .unwrap();

        // One distribution for the compensation token, one for the asset.
        assert_eq!(summaries.len(), 2);
        for summary in &summaries {
            let artifact = MerkleDistribution::load(Path::new(&summary.path)).unwrap();
            assert_eq!(artifact.merkle_root, summary.merkle_root);
            artifact.verify_claim(&account(1)).unwrap();
            artifact.verify_claim(&account(2)).unwrap();
        }

        let _ = fs::remove_file(config_path);
        let _ = fs::remove_file(balances_path);
        let _ = fs::remove_dir_all(out_dir);
    }

    #[test]
    fn missing_inputs_are_rejected() {
        let err = run_distribute("/nonexistent/config.json", &[], &[], "/tmp").unwrap_err();
        assert!(err.contains("at least one balances artifact"));
    }
}
