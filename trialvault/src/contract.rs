//! Contract surface of the ledger.
//!
//! [`TrialLedger`] binds configuration, the event sink and the components, and
//! exposes one method per contract operation. Every method takes the store the
//! substrate opened for the invocation and the invocation's context; none of
//! them commits. The substrate commits the write set when a method returns `Ok`
//! and discards it otherwise.

use tracing::debug;

use crate::admission::AdmissionGate;
use crate::audit::{AuditEntry, AuditTrail};
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::events::{EventSink, NullEventSink};
use crate::identity::InvocationContext;
use crate::registry::{AnonymizedView, PublicView, RecordRegistry};
use crate::seed;
use crate::store::RecordStore;
use crate::types::{AccessRequest, RecordDraft, RequestStatus, TrialRecord, VoteDecision};
use crate::workflow::AccessRequestWorkflow;

/// The clinical-trial ledger contract.
pub struct TrialLedger {
    config: LedgerConfig,
    gate: AdmissionGate,
    workflow: AccessRequestWorkflow,
    audit: AuditTrail,
}

impl TrialLedger {
    /// Create a ledger that discards events.
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_events(config, Box::new(NullEventSink))
    }

    /// Create a ledger emitting workflow events to `events`.
    pub fn with_events(config: LedgerConfig, events: Box<dyn EventSink>) -> Self {
        Self {
            gate: AdmissionGate::new(config.admission.clone()),
            workflow: AccessRequestWorkflow::with_events(config.consortium.clone(), events),
            audit: AuditTrail::new(config.audit.clone()),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Seed the fixture trials. Idempotent.
    pub fn init_ledger<S>(&self, store: &mut S) -> Result<usize>
    where
        S: RecordStore + ?Sized,
    {
        seed::init_ledger(store)
    }

    /// Admit a trial supplied as JSON.
    pub fn submit_trial<S>(
        &self,
        store: &mut S,
        trial_json: &str,
        approval_token: &str,
        ctx: &InvocationContext,
    ) -> Result<String>
    where
        S: RecordStore + ?Sized,
    {
        self.gate.admit_json(store, trial_json, approval_token, ctx)
    }

    /// Admit a typed draft.
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
        self.gate.admit(store, draft, approval_token, ctx)
    }

    /// Public view of every trial.
    pub fn public_trials<S>(&self, store: &S) -> Result<Vec<PublicView>>
    where
        S: RecordStore + ?Sized,
    {
        RecordRegistry::enumerate_all(store)
    }

    /// Public view of one trial.
    pub fn public_trial<S>(&self, store: &S, trial_id: &str) -> Result<PublicView>
    where
        S: RecordStore + ?Sized,
    {
        RecordRegistry::public_by_id(store, trial_id)
    }

    /// Anonymized view of one trial, for grant holders.
    pub fn anonymized_trial<S>(
        &self,
        store: &S,
        trial_id: &str,
        ctx: &InvocationContext,
    ) -> Result<AnonymizedView>
    where
        S: RecordStore + ?Sized,
    {
        RecordRegistry::anonymized_by_id(store, trial_id, ctx)
    }

    /// Full record of one trial, for its publisher.
    pub fn full_trial<S>(
        &self,
        store: &S,
        trial_id: &str,
        ctx: &InvocationContext,
    ) -> Result<TrialRecord>
    where
        S: RecordStore + ?Sized,
    {
        RecordRegistry::full_by_id(store, trial_id, ctx)
    }

    /// Full record of every trial, for privileged organizations.
    pub fn all_trials<S>(&self, store: &S, ctx: &InvocationContext) -> Result<Vec<TrialRecord>>
    where
        S: RecordStore + ?Sized,
    {
        self.audit.all_records(store, ctx.caller_org())
    }

    /// Open an access request for the caller.
    pub fn request_access<S>(
        &self,
        store: &mut S,
        trial_id: &str,
        purpose: &str,
        ctx: &InvocationContext,
    ) -> Result<String>
    where
        S: RecordStore + ?Sized,
    {
        self.workflow.submit(store, trial_id, purpose, ctx)
    }

    /// Vote on an access request, with the decision given as text.
    ///
    /// The decision must be exactly `approve` or `reject`.
    pub fn vote_on_access<S>(
        &self,
        store: &mut S,
        request_id: &str,
        decision: &str,
        comments: &str,
        ctx: &InvocationContext,
    ) -> Result<RequestStatus>
    where
        S: RecordStore + ?Sized,
    {
        let decision: VoteDecision = decision.parse()?;
        debug!(request_id = %request_id, decision = %decision, "Vote received");
        self.workflow
            .cast_vote(store, request_id, decision, comments, ctx)
    }

    /// Load one access request.
    pub fn access_request<S>(&self, store: &S, request_id: &str) -> Result<AccessRequest>
    where
        S: RecordStore + ?Sized,
    {
        AccessRequestWorkflow::load_request(store, request_id)
    }

    /// Every request still awaiting a decision.
    pub fn pending_requests<S>(&self, store: &S) -> Result<Vec<AccessRequest>>
    where
        S: RecordStore + ?Sized,
    {
        AccessRequestWorkflow::pending_requests(store)
    }

    /// Commit history of one trial, for privileged organizations.
    pub fn audit_trail<S>(
        &self,
        store: &S,
        trial_id: &str,
        ctx: &InvocationContext,
    ) -> Result<Vec<AuditEntry>>
    where
        S: RecordStore + ?Sized,
    {
        self.audit.get_history(store, trial_id, ctx.caller_org())
    }
}

impl Default for TrialLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::identity::CallerIdentity;
    use crate::store::InMemoryLedger;
    use chrono::{DateTime, TimeZone, Utc};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap()
    }

    fn ctx(id: &str, org: &str, tx: &str) -> InvocationContext {
        InvocationContext::new(CallerIdentity::new(id, org), tx, at())
    }

    #[test]
    fn test_vote_decision_text_is_strict() {
        let contract = TrialLedger::default();
        let mut ledger = InMemoryLedger::new();
        ledger
            .execute("init", at(), |tx| contract.init_ledger(tx))
            .unwrap();
        let alice = ctx("alice", "ResearchMSP", "tx-req");
        let request_id = ledger
            .execute("tx-req", at(), |tx| {
                contract.request_access(tx, "DIAB-001", "cohort study", &alice)
            })
            .unwrap();

        let reg = ctx("reg", "RegulatorMSP", "tx-v1");
        let err = ledger
            .execute("tx-v1", at(), |tx| {
                contract.vote_on_access(tx, &request_id, "yes please", "", &reg)
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let status = ledger
            .execute("tx-v1", at(), |tx| {
                contract.vote_on_access(tx, &request_id, "approve", "ok", &reg)
            })
            .unwrap();
        assert_eq!(status, RequestStatus::Pending);
    }

    #[test]
    fn test_submit_trial_json() {
        let contract = TrialLedger::default();
        let mut ledger = InMemoryLedger::new();
        let c = ctx("researcher3", "ResearchMSP", "tx-admit");
        let id = ledger
            .execute("tx-admit", at(), |tx| {
                contract.submit_trial(
                    tx,
                    r#"{"trialId":"CARD-001","title":"Heart","eligibility":"Age 18-40"}"#,
                    "ML_APPROVED",
                    &c,
                )
            })
            .unwrap();

        let tx = ledger.transaction("read", at());
        let public = contract.public_trial(&tx, &id).unwrap();
        assert_eq!(public.published_by, "ResearchMSP");
        let full = contract.full_trial(&tx, &id, &c).unwrap();
        assert_eq!(full.publisher, "researcher3");
        assert!(matches!(
            contract.full_trial(&tx, &id, &ctx("bob", "ResearchMSP", "t")),
            Err(LedgerError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_admin_reads_require_privilege() {
        let contract = TrialLedger::default();
        let mut ledger = InMemoryLedger::new();
        ledger
            .execute("init", at(), |tx| contract.init_ledger(tx))
            .unwrap();
        let tx = ledger.transaction("read", at());

        let reg = ctx("reg", "RegulatorMSP", "t");
        assert_eq!(contract.all_trials(&tx, &reg).unwrap().len(), 2);
        assert_eq!(contract.audit_trail(&tx, "DIAB-001", &reg).unwrap().len(), 1);

        let sponsor = ctx("s", "SponsorMSP", "t");
        assert!(matches!(
            contract.all_trials(&tx, &sponsor),
            Err(LedgerError::Unauthorized(_))
        ));
        assert!(matches!(
            contract.audit_trail(&tx, "DIAB-001", &sponsor),
            Err(LedgerError::Unauthorized(_))
        ));
    }
}
