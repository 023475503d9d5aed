//! Permissioned Clinical-Trial Ledger
//!
//! Business core of a consortium ledger for clinical-trial records:
//!
//! - **Admission**: records enter only with an eligibility range the bias policy
//!   accepts and the external bias check's approval token
//! - **Tiers**: public, anonymized (grant holders) and full (publisher) views
//! - **Consortium voting**: access requests resolved by votes from member orgs
//! - **Audit**: per-record commit history for regulators
//!
//! ```text
//!   caller ──▶ TrialLedger ─┬─▶ AdmissionGate ────────┐
//!                           ├─▶ RecordRegistry ───────┤
//!                           ├─▶ AccessRequestWorkflow ┼──▶ RecordStore (substrate)
//!                           │        └─▶ EventSink    │
//!                           └─▶ AuditTrail ───────────┘
//! ```
//!
//! The core is synchronous and deterministic. Caller identity, transaction id and
//! timestamp arrive in an [`InvocationContext`]; isolation and commit belong to
//! the substrate. [`InMemoryLedger`] is the reference substrate.
//!
//! # Example
//!
//! ```ignore
//! use trialvault::{CallerIdentity, InMemoryLedger, InvocationContext, LedgerConfig, TrialLedger};
//!
//! let contract = TrialLedger::new(LedgerConfig::default());
//! let mut ledger = InMemoryLedger::new();
//! let ctx = InvocationContext::new(CallerIdentity::new("alice", "ResearchMSP"), "tx-1", now);
//!
//! let request_id = ledger.execute("tx-1", now, |tx| {
//!     contract.request_access(tx, "DIAB-001", "meta-analysis", &ctx)
//! })?;
//! ```

pub mod admission;
pub mod audit;
pub mod config;
pub mod contract;
pub mod error;
pub mod events;
pub mod identity;
pub mod registry;
pub mod seed;
pub mod store;
pub mod types;
pub mod workflow;

// Re-export main types
pub use admission::AdmissionGate;
pub use audit::{AuditEntry, AuditTrail};
pub use config::{
    AdmissionConfig, AuditConfig, ConfigError, ConsortiumConfig, LedgerConfig, ResubmissionPolicy,
};
pub use contract::TrialLedger;
pub use error::{LedgerError, Result};
pub use events::{
    BroadcastEventSink, EmittedEvent, EventSink, LedgerEvent, NullEventSink, RecordingEventSink,
    TracingEventSink,
};
pub use identity::{CallerIdentity, IdentityProvider, InvocationContext};
pub use registry::{AnonymizedView, PublicView, RecordRegistry, ANONYMIZATION_NOTE};
pub use store::{HistoryEntry, InMemoryLedger, LedgerTransaction, RecordStore, StoreError};
pub use types::*;
pub use workflow::AccessRequestWorkflow;
