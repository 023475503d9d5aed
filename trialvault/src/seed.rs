//! Fixture trials for demos and fresh networks.
//!
//! Fixtures are written directly, without the admission gate, and carry a fixed
//! timestamp so every peer seeding the ledger produces identical bytes.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::{save_json, RecordStore};
use crate::types::{TrialRecord, TrialStatus};

/// 2026-01-01T00:00:00Z
const SEED_TIMESTAMP_SECS: i64 = 1_767_225_600;

/// Timestamp stamped on every fixture.
pub fn seed_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(SEED_TIMESTAMP_SECS, 0).unwrap_or_default()
}

/// The fixture trials.
pub fn sample_trials() -> Vec<TrialRecord> {
    let at = seed_timestamp();
    let fixture = |id: &str,
                   title: &str,
                   description: &str,
                   phase: &str,
                   publisher: &str,
                   data_hash: &str,
                   summary: &str,
                   eligibility: &str| TrialRecord {
        trial_id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        phase: phase.to_string(),
        status: TrialStatus::Recruiting,
        publisher: publisher.to_string(),
        publisher_org: "ResearchMSP".to_string(),
        data_hash: data_hash.to_string(),
        ml_approved: true,
        ml_token: "ML_APPROVED".to_string(),
        public_summary: summary.to_string(),
        eligibility: eligibility.to_string(),
        created_at: at,
        updated_at: at,
    };

    vec![
        fixture(
            "DIAB-001",
            "Diabetes Drug X Phase 3",
            "Study of new diabetes medication",
            "Phase 3",
            "researcher1",
            "7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069",
            "Testing Diabetes Drug X in 500 patients",
            "Age 18-65 years, diagnosed with Type 2 Diabetes",
        ),
        fixture(
            "CANCER-001",
            "Cancer Immunotherapy Phase 2",
            "Study of new immunotherapy for lung cancer",
            "Phase 2",
            "researcher2",
            "8d92c2768ee2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b",
            "Testing immunotherapy in 300 lung cancer patients",
            "Age 18-75 years, diagnosed with non-small cell lung cancer",
        ),
    ]
}

/// Write every fixture whose id is not already present.
///
/// Returns the number written. Running it again is a no-op.
pub fn init_ledger<S>(store: &mut S) -> Result<usize>
where
    S: RecordStore + ?Sized,
{
    let mut written = 0;
    for trial in sample_trials() {
        if store.get(&trial.trial_id)?.is_some() {
            debug!(trial_id = %trial.trial_id, "Fixture already present");
            continue;
        }
        save_json(store, &trial.trial_id, &trial)?;
        written += 1;
    }
    info!(written, "Ledger seeded");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedger;
    use chrono::TimeZone;

    #[test]
    fn test_seed_timestamp() {
        assert_eq!(
            seed_timestamp(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut ledger = InMemoryLedger::new();
        let at = seed_timestamp();

        let first = ledger.execute("init-1", at, |tx| init_ledger(tx)).unwrap();
        assert_eq!(first, 2);
        let second = ledger.execute("init-2", at, |tx| init_ledger(tx)).unwrap();
        assert_eq!(second, 0);

        assert_eq!(ledger.commit_count("DIAB-001"), 1);
        assert_eq!(ledger.commit_count("CANCER-001"), 1);
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn test_fixtures_are_deterministic() {
        let a = serde_json::to_vec(&sample_trials()).unwrap();
        let b = serde_json::to_vec(&sample_trials()).unwrap();
        assert_eq!(a, b);
    }
}
