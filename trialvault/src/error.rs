//! Error taxonomy for ledger operations.

use chrono::{DateTime, Utc};

use crate::store::StoreError;
use crate::types::RequestStatus;

/// Errors returned by ledger operations.
///
/// Every error is reported to the immediate caller; nothing is retried here.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Record or request does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller's organization lacks the required role
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Eligibility criteria failed the bias-prevention policy
    #[error("Trial rejected by bias policy: {0}")]
    BiasPolicyViolation(String),

    /// Admission token was not accepted
    #[error("Admission denied: {0}")]
    AdmissionDenied(String),

    /// Request already left the pending state
    #[error("Request {request_id} already {status}")]
    AlreadyFinalized {
        request_id: String,
        status: RequestStatus,
    },

    /// Caller already voted on the request
    #[error("{voter} has already voted on request {request_id}")]
    DuplicateVote { request_id: String, voter: String },

    /// Caller may not see the requested tier
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Write would clobber existing state under a reject policy
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Pending request passed its expiry
    #[error("Request {request_id} expired at {expires_at}")]
    RequestExpired {
        request_id: String,
        expires_at: DateTime<Utc>,
    },

    /// Substrate failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Persisted bytes could not be encoded or decoded
    #[error("Codec error for key {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::NotFound(_) => "NotFound",
            Self::Unauthorized(_) => "Unauthorized",
            Self::BiasPolicyViolation(_) => "BiasPolicyViolation",
            Self::AdmissionDenied(_) => "AdmissionDenied",
            Self::AlreadyFinalized { .. } => "AlreadyFinalized",
            Self::DuplicateVote { .. } => "DuplicateVote",
            Self::AccessDenied(_) => "AccessDenied",
            Self::Conflict(_) => "Conflict",
            Self::RequestExpired { .. } => "RequestExpired",
            Self::Store(_) => "StoreError",
            Self::Codec { .. } => "CodecError",
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
