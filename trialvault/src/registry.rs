//! Tier projections of stored trials.
//!
//! Each tier has its own view type built by an exhaustive projection, so what
//! a tier exposes is fixed by the type rather than by whichever fields a map
//! happens to receive.
//!
//! | Tier       | Type               | Gate                                |
//! |------------|--------------------|-------------------------------------|
//! | public     | [`PublicView`]     | none                                |
//! | anonymized | [`AnonymizedView`] | grant for `(trial, caller)` exists  |
//! | full       | [`TrialRecord`]    | caller is the publisher             |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};
use crate::identity::InvocationContext;
use crate::store::{load_json, RecordStore};
use crate::types::{grant_key, is_reserved_key, AccessGrant, TrialRecord, TrialStatus};

/// Marker attached to every anonymized view.
pub const ANONYMIZATION_NOTE: &str = "ANONYMIZED DATA - No patient identifiers";

/// Public tier. Carries no publisher identity, data hash or admission token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PublicView {
    pub trial_id: String,
    pub title: String,
    pub phase: String,
    pub status: TrialStatus,
    pub public_summary: String,
    pub eligibility: String,
    /// Publishing organization
    pub published_by: String,
}

/// Anonymized tier, for researchers holding a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AnonymizedView {
    pub trial_id: String,
    pub title: String,
    pub phase: String,
    pub data_hash: String,
    pub eligibility: String,
    /// Always [`ANONYMIZATION_NOTE`]
    #[serde(rename = "access_note")]
    pub access_note: String,
    /// Invocation timestamp of the read
    #[serde(rename = "accessed_at")]
    pub accessed_at: DateTime<Utc>,
}

/// Builds tier views. Stateless.
pub struct RecordRegistry;

impl RecordRegistry {
    /// Project the public tier.
    pub fn public_view(record: &TrialRecord) -> PublicView {
        PublicView {
            trial_id: record.trial_id.clone(),
            title: record.title.clone(),
            phase: record.phase.clone(),
            status: record.status,
            public_summary: record.public_summary.clone(),
            eligibility: record.eligibility.clone(),
            published_by: record.publisher_org.clone(),
        }
    }

    /// Project the anonymized tier if the caller holds a grant for this trial.
    pub fn anonymized_view<S>(
        store: &S,
        record: &TrialRecord,
        ctx: &InvocationContext,
    ) -> Result<AnonymizedView>
    where
        S: RecordStore + ?Sized,
    {
        if !Self::has_grant(store, &record.trial_id, ctx.caller_id())? {
            warn!(
                trial_id = %record.trial_id,
                caller = %ctx.caller_id(),
                "Anonymized read without grant"
            );
            return Err(LedgerError::AccessDenied(format!(
                "you have not been approved for trial {}",
                record.trial_id
            )));
        }
        Ok(AnonymizedView {
            trial_id: record.trial_id.clone(),
            title: record.title.clone(),
            phase: record.phase.clone(),
            data_hash: record.data_hash.clone(),
            eligibility: record.eligibility.clone(),
            access_note: ANONYMIZATION_NOTE.to_string(),
            accessed_at: ctx.timestamp,
        })
    }

    /// Return the whole record if the caller published it.
    pub fn full_view(record: &TrialRecord, caller_id: &str) -> Result<TrialRecord> {
        if record.publisher != caller_id {
            warn!(trial_id = %record.trial_id, caller = %caller_id, "Full read by non-publisher");
            return Err(LedgerError::AccessDenied(
                "only the publisher can view full data".into(),
            ));
        }
        Ok(record.clone())
    }

    /// Public view of every stored trial, in substrate order.
    ///
    /// Request and grant entries share the keyspace and are skipped, as are
    /// values that do not decode as a trial.
    pub fn enumerate_all<S>(store: &S) -> Result<Vec<PublicView>>
    where
        S: RecordStore + ?Sized,
    {
        Ok(Self::scan_records(store)?
            .iter()
            .map(Self::public_view)
            .collect())
    }

    /// Load a trial by id.
    pub fn load_record<S>(store: &S, trial_id: &str) -> Result<TrialRecord>
    where
        S: RecordStore + ?Sized,
    {
        if is_reserved_key(trial_id) {
            return Err(LedgerError::NotFound(format!("trial {} does not exist", trial_id)));
        }
        load_json(store, trial_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("trial {} does not exist", trial_id)))
    }

    /// Public view of one trial.
    pub fn public_by_id<S>(store: &S, trial_id: &str) -> Result<PublicView>
    where
        S: RecordStore + ?Sized,
    {
        Self::load_record(store, trial_id).map(|r| Self::public_view(&r))
    }

    /// Anonymized view of one trial.
    ///
    /// The grant is checked before existence, so callers without a grant learn
    /// nothing about which ids exist.
    pub fn anonymized_by_id<S>(
        store: &S,
        trial_id: &str,
        ctx: &InvocationContext,
    ) -> Result<AnonymizedView>
    where
        S: RecordStore + ?Sized,
    {
        if !Self::has_grant(store, trial_id, ctx.caller_id())? {
            return Err(LedgerError::AccessDenied(format!(
                "you have not been approved for trial {}",
                trial_id
            )));
        }
        let record = Self::load_record(store, trial_id)?;
        Self::anonymized_view(store, &record, ctx)
    }

    /// Full record of one trial.
    pub fn full_by_id<S>(store: &S, trial_id: &str, ctx: &InvocationContext) -> Result<TrialRecord>
    where
        S: RecordStore + ?Sized,
    {
        let record = Self::load_record(store, trial_id)?;
        Self::full_view(&record, ctx.caller_id())
    }

    /// Whether a grant exists for `(trial_id, user_id)`.
    ///
    /// The stored grant must name exactly this pair; a grant written under the
    /// same key for another pair does not count.
    pub fn has_grant<S>(store: &S, trial_id: &str, user_id: &str) -> Result<bool>
    where
        S: RecordStore + ?Sized,
    {
        let key = grant_key(trial_id, user_id);
        Ok(load_json::<AccessGrant, _>(store, &key)?
            .is_some_and(|grant| grant.trial_id == trial_id && grant.user_id == user_id))
    }

    /// Every decodable trial record, in substrate order.
    pub(crate) fn scan_records<S>(store: &S) -> Result<Vec<TrialRecord>>
    where
        S: RecordStore + ?Sized,
    {
        let mut records = Vec::new();
        for (key, value) in store.range_scan("", "")? {
            if is_reserved_key(&key) {
                continue;
            }
            match serde_json::from_slice::<TrialRecord>(&value) {
                Ok(record) => records.push(record),
                Err(e) => debug!(key = %key, error = %e, "Skipping non-trial entry"),
            }
        }
        Ok(records)
    }
}
