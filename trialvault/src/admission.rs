//! Admission gate for new trial records.
//!
//! The bias-detection model runs outside the ledger. The gate consumes only its
//! verdict (a sentinel token) plus a textual check that the eligibility criteria
//! name an accepted age range.

use tracing::{info, warn};

use crate::config::{AdmissionConfig, ResubmissionPolicy};
use crate::error::{LedgerError, Result};
use crate::identity::InvocationContext;
use crate::store::{save_json, RecordStore};
use crate::types::{validate_trial_id, RecordDraft, TrialRecord, TrialStatus};

/// Validates drafts and writes admitted records.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    config: AdmissionConfig,
}

impl AdmissionGate {
    /// Create a gate.
    pub fn new(config: AdmissionConfig) -> Self {
        Self { config }
    }

    /// Gate configuration.
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Admit a draft, returning its trial id.
    ///
    /// Checks run in order: id shape, eligibility, token, resubmission policy.
    /// Exactly one ledger write on success, none on failure.
    pub fn admit<S>(
        &self,
        store: &mut S,
        draft: RecordDraft,
        approval_token: &str,
        ctx: &InvocationContext,
    ) -> Result<String>
    where
        S: RecordStore + ?Sized,
    {
        validate_trial_id(&draft.trial_id)?;
        self.check_eligibility(&draft)?;

        if approval_token != self.config.approval_token {
            warn!(trial_id = %draft.trial_id, "Admission token rejected");
            return Err(LedgerError::AdmissionDenied(
                "bias verification token was not accepted".into(),
            ));
        }

        if store.get(&draft.trial_id)?.is_some() {
            match self.config.resubmission {
                ResubmissionPolicy::Reject => {
                    return Err(LedgerError::Conflict(format!(
                        "trial {} already exists",
                        draft.trial_id
                    )));
                }
                ResubmissionPolicy::Overwrite => {
                    warn!(
                        trial_id = %draft.trial_id,
                        publisher = %ctx.caller_id(),
                        "Overwriting existing trial"
                    );
                }
            }
        }

        let record = TrialRecord {
            trial_id: draft.trial_id,
            title: draft.title,
            description: draft.description,
            phase: draft.phase,
            status: TrialStatus::Recruiting,
            publisher: ctx.caller_id().to_string(),
            publisher_org: ctx.caller_org().to_string(),
            data_hash: draft.data_hash,
            ml_approved: true,
            ml_token: approval_token.to_string(),
            public_summary: draft.public_summary,
            eligibility: draft.eligibility,
            created_at: ctx.timestamp,
            updated_at: ctx.timestamp,
        };

        save_json(store, &record.trial_id, &record)?;

        info!(
            trial_id = %record.trial_id,
            publisher_org = %record.publisher_org,
            tx_id = %ctx.tx_id,
            "Trial admitted"
        );
        Ok(record.trial_id)
    }

    /// Admit a draft supplied as a JSON document.
    pub fn admit_json<S>(
        &self,
        store: &mut S,
        draft_json: &str,
        approval_token: &str,
        ctx: &InvocationContext,
    ) -> Result<String>
    where
        S: RecordStore + ?Sized,
    {
        let draft: RecordDraft = serde_json::from_str(draft_json)
            .map_err(|e| LedgerError::Validation(format!("invalid trial data: {}", e)))?;
        self.admit(store, draft, approval_token, ctx)
    }

    /// Whether `eligibility` names an accepted age range.
    pub fn accepts_eligibility(&self, eligibility: &str) -> bool {
        self.config
            .accepted_age_ranges
            .iter()
            .any(|marker| eligibility.contains(marker.as_str()))
    }

    fn check_eligibility(&self, draft: &RecordDraft) -> Result<()> {
        if self.accepts_eligibility(&draft.eligibility) {
            return Ok(());
        }
        warn!(trial_id = %draft.trial_id, "Eligibility failed bias policy");
        Err(LedgerError::BiasPolicyViolation(format!(
            "eligibility criteria must specify an accepted age range ({})",
            self.config.accepted_age_ranges.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CallerIdentity;
    use crate::store::InMemoryLedger;
    use chrono::{TimeZone, Utc};

    fn ctx() -> InvocationContext {
        InvocationContext::new(
            CallerIdentity::new("researcher1", "ResearchMSP"),
            "tx-admit",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn draft(eligibility: &str) -> RecordDraft {
        RecordDraft::new("DIAB-002", eligibility)
            .with_title("Diabetes Drug Y")
            .with_phase("Phase 2")
            .with_data_hash("beef")
    }

    #[test]
    fn test_admit_stamps_publisher_and_status() {
        let gate = AdmissionGate::new(AdmissionConfig::default());
        let mut ledger = InMemoryLedger::new();
        let ctx = ctx();

        let id = ledger
            .execute(ctx.tx_id.clone(), ctx.timestamp, |tx| {
                gate.admit(tx, draft("Age 18-65, Type 2"), "ML_APPROVED", &ctx)
            })
            .unwrap();
        assert_eq!(id, "DIAB-002");

        let stored: TrialRecord = serde_json::from_slice(ledger.get("DIAB-002").unwrap()).unwrap();
        assert_eq!(stored.status, TrialStatus::Recruiting);
        assert_eq!(stored.publisher, "researcher1");
        assert_eq!(stored.publisher_org, "ResearchMSP");
        assert!(stored.ml_approved);
        assert_eq!(stored.ml_token, "ML_APPROVED");
        assert_eq!(stored.created_at, ctx.timestamp);
        assert_eq!(stored.updated_at, ctx.timestamp);
    }

    #[test]
    fn test_bias_check_runs_before_token_check() {
        let gate = AdmissionGate::new(AdmissionConfig::default());
        let mut ledger = InMemoryLedger::new();
        let ctx = ctx();
        let mut tx = ledger.transaction("tx", ctx.timestamp);

        let err = gate
            .admit(&mut tx, draft("Adults 18-30 only"), "bogus", &ctx)
            .unwrap_err();
        assert!(matches!(err, LedgerError::BiasPolicyViolation(_)));

        let err = gate
            .admit(&mut tx, draft("All ages"), "bogus", &ctx)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AdmissionDenied(_)));
        assert_eq!(tx.commit(), 0);
    }

    #[test]
    fn test_reserved_id_is_validation_error() {
        let gate = AdmissionGate::new(AdmissionConfig::default());
        let mut ledger = InMemoryLedger::new();
        let ctx = ctx();
        let mut tx = ledger.transaction("tx", ctx.timestamp);

        let err = gate
            .admit(&mut tx, RecordDraft::new("REQ_X", "All ages"), "ML_APPROVED", &ctx)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_admit_json_rejects_malformed_draft() {
        let gate = AdmissionGate::new(AdmissionConfig::default());
        let mut ledger = InMemoryLedger::new();
        let ctx = ctx();
        let mut tx = ledger.transaction("tx", ctx.timestamp);

        let err = gate
            .admit_json(&mut tx, "{not json", "ML_APPROVED", &ctx)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let id = gate
            .admit_json(
                &mut tx,
                r#"{"trialId":"ONC-7","eligibility":"18-40 years","publisher":"mallory"}"#,
                "ML_APPROVED",
                &ctx,
            )
            .unwrap();
        assert_eq!(id, "ONC-7");
    }

    #[test]
    fn test_resubmission_policies() {
        let mut ledger = InMemoryLedger::new();
        let ctx = ctx();
        let overwrite = AdmissionGate::new(AdmissionConfig::default());
        ledger
            .execute("tx1", ctx.timestamp, |tx| {
                overwrite.admit(tx, draft("All ages"), "ML_APPROVED", &ctx)
            })
            .unwrap();
        ledger
            .execute("tx2", ctx.timestamp, |tx| {
                overwrite.admit(tx, draft("18-65"), "ML_APPROVED", &ctx)
            })
            .unwrap();
        assert_eq!(ledger.commit_count("DIAB-002"), 2);

        let reject = AdmissionGate::new(AdmissionConfig {
            resubmission: ResubmissionPolicy::Reject,
            ..Default::default()
        });
        let err = ledger
            .execute("tx3", ctx.timestamp, |tx| {
                reject.admit(tx, draft("18-65"), "ML_APPROVED", &ctx)
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(ledger.commit_count("DIAB-002"), 2);
    }

    #[test]
    fn test_custom_markers() {
        let gate = AdmissionGate::new(AdmissionConfig {
            accepted_age_ranges: vec!["65+".into()],
            ..Default::default()
        });
        assert!(gate.accepts_eligibility("Seniors 65+"));
        assert!(!gate.accepts_eligibility("Age 18-65"));
    }
}
