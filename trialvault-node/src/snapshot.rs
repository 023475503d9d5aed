//! JSON snapshot persistence for the in-memory substrate.

use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use trialvault::InMemoryLedger;

/// Load a snapshot, or start an empty ledger if none exists yet.
pub fn load(path: &Path) -> anyhow::Result<InMemoryLedger> {
    if !path.exists() {
        info!(path = %path.display(), "No snapshot found, starting empty ledger");
        return Ok(InMemoryLedger::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let ledger: InMemoryLedger = serde_json::from_str(&content)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    debug!(path = %path.display(), height = ledger.height(), "Snapshot loaded");
    Ok(ledger)
}

/// Write a snapshot, replacing the previous one atomically.
pub fn save(path: &Path, ledger: &InMemoryLedger) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(ledger).context("encoding snapshot")?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("replacing snapshot {}", path.display()))?;
    debug!(path = %path.display(), height = ledger.height(), "Snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use trialvault::TrialLedger;

    #[test]
    fn test_missing_snapshot_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = load(&dir.path().join("state.json")).unwrap();
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn test_roundtrip_preserves_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let contract = TrialLedger::default();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let mut ledger = InMemoryLedger::new();
        ledger
            .execute("init", at, |tx| contract.init_ledger(tx))
            .unwrap();
        save(&path, &ledger).unwrap();
        assert!(!dir.path().join("state.tmp").exists());

        let restored = load(&path).unwrap();
        assert_eq!(restored.height(), ledger.height());
        assert_eq!(restored.commit_count("DIAB-001"), 1);
        assert_eq!(restored.get("CANCER-001"), ledger.get("CANCER-001"));
    }

    #[test]
    fn test_corrupt_snapshot_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not a ledger").unwrap();
        let err = load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("state.json"));
    }
}
