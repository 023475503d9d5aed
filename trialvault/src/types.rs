//! Ledger value types.
//!
//! Field names and enum literals below are the persisted wire shape shared with
//! every other client of the ledger. Renaming a field breaks replay of existing
//! ledger data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Key prefix for access requests.
pub const REQUEST_KEY_PREFIX: &str = "REQ_";

/// Exclusive upper bound for a range scan over all access requests.
pub(crate) const REQUEST_KEY_RANGE_END: &str = "REQ`";

/// Key prefix for access grants.
pub const GRANT_KEY_PREFIX: &str = "ACCESS_";

/// Separator between the parts of request and grant keys.
///
/// Trial ids never contain it, so the first separator after the prefix ends
/// the trial id and composite keys decode to exactly one pair.
pub const KEY_SEPARATOR: char = '_';

/// Lifecycle status of a clinical trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    /// Accepting participants
    #[default]
    Recruiting,
    /// Running, enrolment closed
    Active,
    /// Finished
    Completed,
    /// Stopped early
    Terminated,
}

impl TrialStatus {
    /// Wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recruiting => "recruiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A clinical trial as persisted on the ledger.
///
/// This is also the full-tier view: only the publisher ever receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    /// Primary key
    pub trial_id: String,
    pub title: String,
    pub description: String,
    pub phase: String,
    pub status: TrialStatus,

    /// Identity of the submitting caller
    pub publisher: String,
    /// Organization of the submitting caller
    pub publisher_org: String,

    /// Digest of the off-ledger dataset
    pub data_hash: String,
    /// Set once the admission gate accepted the record
    pub ml_approved: bool,
    /// Token presented at admission
    pub ml_token: String,

    /// Public-tier summary
    pub public_summary: String,
    /// Free-text eligibility; must name an accepted age range
    pub eligibility: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields of a record awaiting admission.
///
/// Publisher, status and approval fields are never taken from the caller, so
/// they are absent here and ignored when present in a JSON draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordDraft {
    pub trial_id: String,
    pub title: String,
    pub description: String,
    pub phase: String,
    pub data_hash: String,
    pub public_summary: String,
    pub eligibility: String,
}

impl RecordDraft {
    /// Create a draft with the given id and eligibility text.
    pub fn new(trial_id: impl Into<String>, eligibility: impl Into<String>) -> Self {
        Self {
            trial_id: trial_id.into(),
            eligibility: eligibility.into(),
            ..Default::default()
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the phase.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// Set the dataset digest.
    pub fn with_data_hash(mut self, data_hash: impl Into<String>) -> Self {
        self.data_hash = data_hash.into();
        self
    }

    /// Set the public summary.
    pub fn with_public_summary(mut self, summary: impl Into<String>) -> Self {
        self.public_summary = summary.into();
        self
    }
}

/// Status of an access request. Never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether no further votes are accepted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consortium member's decision on an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    Approve,
    Reject,
}

impl VoteDecision {
    /// Wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteDecision {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(LedgerError::Validation(format!(
                "unknown vote decision '{}', expected 'approve' or 'reject'",
                other
            ))),
        }
    }
}

/// A single vote. Immutable once appended to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub voter: String,
    pub voter_org: String,
    pub decision: VoteDecision,
    #[serde(default)]
    pub comments: String,
    pub timestamp: DateTime<Utc>,
}

/// A researcher's request for anonymized-tier access to one trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub request_id: String,
    pub trial_id: String,
    pub requester: String,
    pub requester_org: String,
    pub purpose: String,
    pub status: RequestStatus,
    /// Votes in the order they were cast
    #[serde(default)]
    pub votes: Vec<Vote>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Whether the request still accepts votes.
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Whether `voter` already cast a vote.
    pub fn has_voted(&self, voter: &str) -> bool {
        self.votes.iter().any(|v| v.voter == voter)
    }

    /// Distinct organizations with at least one approving vote.
    pub fn approving_orgs(&self) -> BTreeSet<&str> {
        self.votes
            .iter()
            .filter(|v| v.decision == VoteDecision::Approve)
            .map(|v| v.voter_org.as_str())
            .collect()
    }

    /// Whether the request is stale at `at`.
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }
}

/// Durable permission for one identity to read one trial's anonymized tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub trial_id: String,
    pub user_id: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Ledger key of an access request.
///
/// Unambiguous only for trial ids accepted by admission.
pub fn request_key(trial_id: &str, distinguisher: &str) -> String {
    format!("{}{}{}{}", REQUEST_KEY_PREFIX, trial_id, KEY_SEPARATOR, distinguisher)
}

/// Ledger key of the grant for `(trial_id, user_id)`.
///
/// Unambiguous only for trial ids accepted by admission.
pub fn grant_key(trial_id: &str, user_id: &str) -> String {
    format!("{}{}{}{}", GRANT_KEY_PREFIX, trial_id, KEY_SEPARATOR, user_id)
}

/// Whether `key` belongs to the request or grant namespace.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(REQUEST_KEY_PREFIX) || key.starts_with(GRANT_KEY_PREFIX)
}

/// Check that `trial_id` can serve as a record key.
pub(crate) fn validate_trial_id(trial_id: &str) -> Result<(), LedgerError> {
    if trial_id.is_empty() {
        return Err(LedgerError::Validation("trial id must not be empty".into()));
    }
    if trial_id.chars().any(char::is_whitespace) {
        return Err(LedgerError::Validation(format!(
            "trial id '{}' must not contain whitespace",
            trial_id
        )));
    }
    if is_reserved_key(trial_id) {
        return Err(LedgerError::Validation(format!(
            "trial id '{}' uses a reserved key prefix",
            trial_id
        )));
    }
    if trial_id.contains(KEY_SEPARATOR) {
        return Err(LedgerError::Validation(format!(
            "trial id '{}' must not contain '{}'",
            trial_id, KEY_SEPARATOR
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_record_wire_names() {
        let record = TrialRecord {
            trial_id: "DIAB-001".into(),
            title: "t".into(),
            description: "d".into(),
            phase: "Phase 3".into(),
            status: TrialStatus::Recruiting,
            publisher: "researcher1".into(),
            publisher_org: "ResearchMSP".into(),
            data_hash: "abc".into(),
            ml_approved: true,
            ml_token: "ML_APPROVED".into(),
            public_summary: "s".into(),
            eligibility: "Age 18-65".into(),
            created_at: ts(),
            updated_at: ts(),
        };
        let json = serde_json::to_value(&record).unwrap();
        for key in [
            "trialId",
            "title",
            "description",
            "phase",
            "status",
            "publisher",
            "publisherOrg",
            "dataHash",
            "mlApproved",
            "mlToken",
            "publicSummary",
            "eligibility",
            "createdAt",
            "updatedAt",
        ] {
            assert!(json.get(key).is_some(), "missing wire field {}", key);
        }
        assert_eq!(json["status"], "recruiting");
    }

    #[test]
    fn test_draft_ignores_privileged_fields() {
        let draft: RecordDraft = serde_json::from_str(
            r#"{"trialId":"X-1","eligibility":"All ages","publisher":"mallory","mlApproved":true}"#,
        )
        .unwrap();
        assert_eq!(draft.trial_id, "X-1");
        assert!(draft.title.is_empty());
    }

    #[test]
    fn test_vote_decision_parsing() {
        assert_eq!("approve".parse::<VoteDecision>().unwrap(), VoteDecision::Approve);
        assert_eq!("reject".parse::<VoteDecision>().unwrap(), VoteDecision::Reject);
        assert!(matches!(
            "Approve".parse::<VoteDecision>(),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_approving_orgs_are_distinct() {
        let vote = |voter: &str, org: &str, decision| Vote {
            voter: voter.into(),
            voter_org: org.into(),
            decision,
            comments: String::new(),
            timestamp: ts(),
        };
        let request = AccessRequest {
            request_id: request_key("T", "1"),
            trial_id: "T".into(),
            requester: "r".into(),
            requester_org: "ResearchMSP".into(),
            purpose: "p".into(),
            status: RequestStatus::Pending,
            votes: vec![
                vote("a", "SponsorMSP", VoteDecision::Approve),
                vote("b", "SponsorMSP", VoteDecision::Approve),
                vote("c", "EthicsMSP", VoteDecision::Reject),
            ],
            created_at: ts(),
            expires_at: ts(),
        };
        assert_eq!(request.approving_orgs().len(), 1);
        assert!(request.has_voted("c"));
        assert!(!request.has_voted("d"));
    }

    #[test]
    fn test_trial_id_validation() {
        assert!(validate_trial_id("DIAB-001").is_ok());
        assert!(validate_trial_id("").is_err());
        assert!(validate_trial_id("has space").is_err());
        assert!(validate_trial_id("REQ_DIAB").is_err());
        assert!(validate_trial_id("ACCESS_DIAB").is_err());
        assert!(validate_trial_id("A_B").is_err());
    }

    #[test]
    fn test_keys_of_valid_ids_do_not_collide() {
        // With "A_B" refused as a trial id, ("A", "B_C") owns ACCESS_A_B_C alone.
        assert!(validate_trial_id("A").is_ok());
        assert!(validate_trial_id("A_B").is_err());
        assert_eq!(grant_key("A", "B_C"), "ACCESS_A_B_C");
        assert_eq!(request_key("A", "B_1"), "REQ_A_B_1");
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(request_key("DIAB-001", "tx9"), "REQ_DIAB-001_tx9");
        assert_eq!(grant_key("DIAB-001", "alice"), "ACCESS_DIAB-001_alice");
        assert!(REQUEST_KEY_PREFIX < REQUEST_KEY_RANGE_END);
        assert!(request_key("zzz", "zzz").as_str() < REQUEST_KEY_RANGE_END);
    }
}
