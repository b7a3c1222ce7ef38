//! Replays a persisted transfer log into a balances artifact.

use crate::account::Account;
use crate::ledger::{AssetSymbol, BalanceMap};
use crate::source::{balances_from_transfers, TransferEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Persisted transfer log for one asset, as exported by the data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLogFile {
    /// Asset the transfers belong to.
    pub asset: AssetSymbol,
    /// Transfers in chronological order up to the snapshot block.
    pub events: Vec<TransferEvent>,
}

/// Summary returned after a successful replay.
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    /// Asset that was replayed.
    pub asset: String,
    /// Number of accounts holding a non-zero balance.
    pub accounts: usize,
    /// Sum of all replayed balances.
    pub total: u128,
}

/// Replays the transfer log at `events_path` and writes the resulting
/// balances artifact to `output`. Accounts in `exclude` (pool contracts,
/// the burn address) are dropped from the result.
pub fn run_snapshot(
    events_path: &str,
    output: &str,
    exclude: &[String],
) -> Result<SnapshotSummary, String> {
    let source = Path::new(events_path);
    let bytes = std::fs::read(source)
        .map_err(|err| format!("failed to read transfer log {}: {err}", source.display()))?;
    let log: TransferLogFile =
        serde_json::from_slice(&bytes).map_err(|err| format!("invalid transfer log: {err}"))?;

    let mut excluded = BTreeSet::new();
    for raw in exclude {
        excluded.insert(Account::parse(raw)?);
    }

    let ledger = balances_from_transfers(&log.asset, &log.events, &excluded)
        .map_err(|err| format!("replay of {} failed: {err}", log.asset))?;

    let mut balances = BalanceMap::new();
    let accounts = ledger.len();
    balances.set_ledger(log.asset.clone(), ledger);
    let total = balances
        .asset_total(&log.asset)
        .map_err(|err| format!("summing replayed balances failed: {err}"))?;

    balances.save(Path::new(output))?;

    Ok(SnapshotSummary {
        asset: log.asset.to_string(),
        accounts,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::run_snapshot;
    use crate::ledger::BalanceMap;
    use serde_json::json;
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

    #[test]
    fn replay_writes_a_loadable_balances_artifact() {
        let events = temp_path("events.json");
        let output = temp_path("balances.json");

        let zero = format!("0x{}", "0".repeat(40));
        let holder = format!("0x{}{}", "0".repeat(38), "01");
        let pool = format!("0x{}{}", "0".repeat(38), "99");
        let payload = json!({
            "asset": "vaultA",
            "events": [
                {"from": zero, "to": holder, "amount": 1000},
                {"from": holder, "to": pool, "amount": 250}
            ]
        });
        fs::write(&events, serde_json::to_vec(&payload).unwrap()).unwrap();

        let summary = run_snapshot(
            events.to_str().unwrap(),
            output.to_str().unwrap(),
            &[pool.clone()],
        )
        .unwrap();
        assert_eq!(summary.asset, "vaultA");
        assert_eq!(summary.accounts, 1);
        assert_eq!(summary.total, 750);

        let balances = BalanceMap::load(Path::new(&output)).unwrap();
        assert_eq!(balances.asset_total(&"vaultA".into()).unwrap(), 750);

        let _ = fs::remove_file(events);
        let _ = fs::remove_file(output);
    }

    #[test]
    fn malformed_exclude_address_is_reported() {
        let events = temp_path("events_bad_exclude.json");
        let payload = json!({"asset": "vaultA", "events": []});
        fs::write(&events, serde_json::to_vec(&payload).unwrap()).unwrap();

        let err = run_snapshot(
            events.to_str().unwrap(),
            "/tmp/unused.json",
            &["not-an-address".to_string()],
        )
        .unwrap_err();
        assert!(err.contains("0x prefix"));

        let _ = fs::remove_file(events);
    }
}
