//! Audit trail over trial records.
//!
//! Privileged organizations can read the commit history of any trial and dump
//! every stored record. Everyone else is refused before any read happens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AuditConfig;
use crate::error::{LedgerError, Result};
use crate::registry::RecordRegistry;
use crate::store::RecordStore;
use crate::types::{is_reserved_key, TrialRecord};

/// One historical version of a trial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Transaction that wrote this version
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    /// Record as written, absent for a deletion or an undecodable version
    pub value: Option<TrialRecord>,
    pub is_delete: bool,
}

/// Read access to history for privileged organizations.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    config: AuditConfig,
}

impl AuditTrail {
    /// Create an audit trail.
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    /// Audit configuration.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Whether `org` may read history.
    pub fn is_privileged(&self, org: &str) -> bool {
        self.config.is_privileged(org)
    }

    /// Every version of `trial_id`, oldest first.
    ///
    /// A trial that was never written yields an empty history. A version that
    /// does not decode as a trial is still listed, with no value.
    pub fn get_history<S>(
        &self,
        store: &S,
        trial_id: &str,
        caller_org: &str,
    ) -> Result<Vec<AuditEntry>>
    where
        S: RecordStore + ?Sized,
    {
        self.authorize(caller_org, "audit history")?;
        if is_reserved_key(trial_id) {
            return Err(LedgerError::Validation(format!(
                "'{}' is not a trial id",
                trial_id
            )));
        }

        let history = store.history(trial_id)?;
        let mut entries = Vec::with_capacity(history.len());
        for entry in history {
            let is_delete = entry.is_delete();
            let value = match entry.value {
                Some(bytes) => match serde_json::from_slice::<TrialRecord>(&bytes) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(
                            trial_id = %trial_id,
                            tx_id = %entry.tx_id,
                            error = %e,
                            "Historical version is not a trial record"
                        );
                        None
                    }
                },
                None => None,
            };
            entries.push(AuditEntry {
                tx_id: entry.tx_id,
                timestamp: entry.timestamp,
                value,
                is_delete,
            });
        }

        info!(
            trial_id = %trial_id,
            org = %caller_org,
            versions = entries.len(),
            "Audit history read"
        );
        Ok(entries)
    }

    /// Full records of every stored trial.
    pub fn all_records<S>(&self, store: &S, caller_org: &str) -> Result<Vec<TrialRecord>>
    where
        S: RecordStore + ?Sized,
    {
        self.authorize(caller_org, "full record listing")?;
        let records = RecordRegistry::scan_records(store)?;
        info!(org = %caller_org, records = records.len(), "Full record listing read");
        Ok(records)
    }

    fn authorize(&self, org: &str, what: &str) -> Result<()> {
        if self.is_privileged(org) {
            return Ok(());
        }
        warn!(org = %org, "Refused {}", what);
        Err(LedgerError::Unauthorized(format!(
            "only regulators can access {}",
            what
        )))
    }
}
