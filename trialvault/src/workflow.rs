//! Access-request voting workflow.
//!
//! ```text
//!              ┌──────────┐  distinct approving orgs >= quorum  ┌──────────┐
//!   submit ───▶│ pending  │────────────────────────────────────▶│ approved │──▶ grant
//!              └────┬─────┘                                     └──────────┘
//!                   │ total votes >= limit, no quorum           ┌──────────┐
//!                   └──────────────────────────────────────────▶│ rejected │
//!                                                               └──────────┘
//! ```
//!
//! The approval rule is evaluated before the rejection rule on every vote.
//! Both end states are terminal.

use chrono::{DateTime, Months, Utc};
use tracing::{debug, info, warn};

use crate::config::ConsortiumConfig;
use crate::error::{LedgerError, Result};
use crate::events::{emit_event, EventSink, LedgerEvent, NullEventSink};
use crate::identity::InvocationContext;
use crate::registry::RecordRegistry;
use crate::store::{load_json, save_json, RecordStore};
use crate::types::{
    grant_key, request_key, AccessGrant, AccessRequest, RequestStatus, Vote, VoteDecision,
    KEY_SEPARATOR, REQUEST_KEY_PREFIX, REQUEST_KEY_RANGE_END,
};

/// Runs the request → vote → grant/reject state machine.
pub struct AccessRequestWorkflow {
    config: ConsortiumConfig,
    events: Box<dyn EventSink>,
}

impl AccessRequestWorkflow {
    /// Create a workflow that discards events.
    pub fn new(config: ConsortiumConfig) -> Self {
        Self::with_events(config, Box::new(NullEventSink))
    }

    /// Create a workflow emitting to `events`.
    pub fn with_events(config: ConsortiumConfig, events: Box<dyn EventSink>) -> Self {
        Self { config, events }
    }

    /// Consortium configuration.
    pub fn config(&self) -> &ConsortiumConfig {
        &self.config
    }

    /// Open a pending request for `trial_id` on behalf of the caller.
    ///
    /// The request id is derived from the trial id and the invocation's
    /// transaction id.
    pub fn submit<S>(
        &self,
        store: &mut S,
        trial_id: &str,
        purpose: &str,
        ctx: &InvocationContext,
    ) -> Result<String>
    where
        S: RecordStore + ?Sized,
    {
        if purpose.trim().is_empty() {
            return Err(LedgerError::Validation("purpose must not be empty".into()));
        }
        RecordRegistry::load_record(store, trial_id)?;
        if trial_id.contains(KEY_SEPARATOR) {
            return Err(LedgerError::Validation(format!(
                "trial id '{}' cannot key an access request",
                trial_id
            )));
        }

        let request_id = request_key(trial_id, &ctx.tx_id);
        if store.get(&request_id)?.is_some() {
            return Err(LedgerError::Conflict(format!(
                "request {} already exists",
                request_id
            )));
        }

        let request = AccessRequest {
            request_id: request_id.clone(),
            trial_id: trial_id.to_string(),
            requester: ctx.caller_id().to_string(),
            requester_org: ctx.caller_org().to_string(),
            purpose: purpose.to_string(),
            status: RequestStatus::Pending,
            votes: Vec::new(),
            created_at: ctx.timestamp,
            expires_at: self.expiry_for(ctx.timestamp),
        };
        save_json(store, &request_id, &request)?;

        info!(
            request_id = %request_id,
            trial_id = %trial_id,
            requester_org = %ctx.caller_org(),
            "Access requested"
        );
        emit_event(self.events.as_ref(), LedgerEvent::AccessRequested, &request_id);
        Ok(request_id)
    }

    /// Record the caller's vote and resolve the request if a rule fires.
    ///
    /// Returns the request status after the vote.
    pub fn cast_vote<S>(
        &self,
        store: &mut S,
        request_id: &str,
        decision: VoteDecision,
        comments: &str,
        ctx: &InvocationContext,
    ) -> Result<RequestStatus>
    where
        S: RecordStore + ?Sized,
    {
        if !self.config.is_voter(ctx.caller_org()) {
            warn!(org = %ctx.caller_org(), request_id = %request_id, "Vote from non-member");
            return Err(LedgerError::Unauthorized(
                "only consortium members can vote".into(),
            ));
        }

        let mut request = Self::load_request(store, request_id)?;

        if !request.is_pending() {
            debug!(request_id = %request_id, status = %request.status, "Vote on finalized request");
            return Err(LedgerError::AlreadyFinalized {
                request_id: request_id.to_string(),
                status: request.status,
            });
        }
        if self.config.expire_stale_requests && request.is_expired_at(ctx.timestamp) {
            return Err(LedgerError::RequestExpired {
                request_id: request_id.to_string(),
                expires_at: request.expires_at,
            });
        }
        if request.has_voted(ctx.caller_id()) {
            return Err(LedgerError::DuplicateVote {
                request_id: request_id.to_string(),
                voter: ctx.caller_id().to_string(),
            });
        }

        request.votes.push(Vote {
            voter: ctx.caller_id().to_string(),
            voter_org: ctx.caller_org().to_string(),
            decision,
            comments: comments.to_string(),
            timestamp: ctx.timestamp,
        });

        let approving_orgs = request.approving_orgs().len();
        let event = if approving_orgs >= self.config.approvals_required {
            request.status = RequestStatus::Approved;
            self.write_grant(store, &request, ctx.timestamp)?;
            Some(LedgerEvent::AccessApproved)
        } else if request.votes.len() >= self.config.max_votes {
            request.status = RequestStatus::Rejected;
            Some(LedgerEvent::AccessRejected)
        } else {
            None
        };

        save_json(store, request_id, &request)?;

        info!(
            request_id = %request_id,
            voter_org = %ctx.caller_org(),
            decision = %decision,
            votes = request.votes.len(),
            approving_orgs,
            status = %request.status,
            "Vote recorded"
        );
        if let Some(event) = event {
            emit_event(self.events.as_ref(), event, request_id);
        }
        Ok(request.status)
    }

    /// Load a request by id.
    pub fn load_request<S>(store: &S, request_id: &str) -> Result<AccessRequest>
    where
        S: RecordStore + ?Sized,
    {
        let not_found = || LedgerError::NotFound(format!("request {} does not exist", request_id));
        if !request_id.starts_with(REQUEST_KEY_PREFIX) {
            return Err(not_found());
        }
        load_json(store, request_id)?.ok_or_else(not_found)
    }

    /// Every request still awaiting a decision, in key order.
    pub fn pending_requests<S>(store: &S) -> Result<Vec<AccessRequest>>
    where
        S: RecordStore + ?Sized,
    {
        let mut pending = Vec::new();
        for (key, value) in store.range_scan(REQUEST_KEY_PREFIX, REQUEST_KEY_RANGE_END)? {
            let request: AccessRequest = serde_json::from_slice(&value)
                .map_err(|source| LedgerError::Codec { key, source })?;
            if request.is_pending() {
                pending.push(request);
            }
        }
        Ok(pending)
    }

    fn expiry_for(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at
            .checked_add_months(Months::new(self.config.request_ttl_months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Create the grant for an approved request.
    ///
    /// Grants are never updated: if the pair already holds one from an earlier
    /// approval, it is kept as is.
    fn write_grant<S>(
        &self,
        store: &mut S,
        request: &AccessRequest,
        granted_at: DateTime<Utc>,
    ) -> Result<()>
    where
        S: RecordStore + ?Sized,
    {
        let key = grant_key(&request.trial_id, &request.requester);
        if let Some(existing) = load_json::<AccessGrant, _>(store, &key)? {
            if existing.trial_id != request.trial_id || existing.user_id != request.requester {
                warn!(
                    key = %key,
                    trial_id = %existing.trial_id,
                    user_id = %existing.user_id,
                    "Grant key held by another pair"
                );
                return Err(LedgerError::Conflict(format!(
                    "grant key {} belongs to another trial and user",
                    key
                )));
            }
            info!(
                trial_id = %request.trial_id,
                requester = %request.requester,
                "Grant already present; keeping original"
            );
            return Ok(());
        }
        let grant = AccessGrant {
            trial_id: request.trial_id.clone(),
            user_id: request.requester.clone(),
            granted_at,
            expires_at: request.expires_at,
        };
        save_json(store, &key, &grant)?;
        info!(
            trial_id = %grant.trial_id,
            requester = %grant.user_id,
            "Access granted"
        );
        Ok(())
    }
}
