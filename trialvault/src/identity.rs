//! Caller identity and per-invocation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of the authenticated caller for one invocation.
///
/// Authentication happens in the substrate; the core trusts what this yields.
pub trait IdentityProvider {
    /// Caller identity.
    fn caller_id(&self) -> &str;

    /// Caller organization.
    fn caller_org(&self) -> &str;
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Identity string (certificate subject or similar)
    pub id: String,
    /// Organization (membership service) id
    pub org: String,
}

impl CallerIdentity {
    /// Create a caller identity.
    pub fn new(id: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            org: org.into(),
        }
    }
}

impl IdentityProvider for CallerIdentity {
    fn caller_id(&self) -> &str {
        &self.id
    }

    fn caller_org(&self) -> &str {
        &self.org
    }
}

/// Everything an operation may depend on besides its arguments and committed state.
///
/// `timestamp` is supplied once per invocation by the substrate. Operations never
/// read a clock, so every replica evaluating the same invocation agrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// Authenticated caller
    pub caller: CallerIdentity,
    /// Substrate transaction id, unique per invocation
    pub tx_id: String,
    /// Deterministic transaction timestamp
    pub timestamp: DateTime<Utc>,
}

impl InvocationContext {
    /// Create a context.
    pub fn new(caller: CallerIdentity, tx_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            caller,
            tx_id: tx_id.into(),
            timestamp,
        }
    }

    /// Create a context from an identity provider.
    pub fn from_provider(
        provider: &dyn IdentityProvider,
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            CallerIdentity::new(provider.caller_id(), provider.caller_org()),
            tx_id,
            timestamp,
        )
    }

    /// Caller identity.
    pub fn caller_id(&self) -> &str {
        &self.caller.id
    }

    /// Caller organization.
    pub fn caller_org(&self) -> &str {
        &self.caller.org
    }
}
