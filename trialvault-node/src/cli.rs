//! Ledger subcommands.
//!
//! Each command is one invocation against the ledger. Read commands open a
//! transaction and drop it; write commands commit only when the contract
//! operation succeeds.

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

use trialvault::{InMemoryLedger, InvocationContext, TrialLedger};

/// Ledger commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Seed the sample trials (skips ids already present)
    Init,

    /// Admit a trial from a JSON draft
    Admit {
        /// Path to the draft JSON
        #[arg(short, long)]
        draft: PathBuf,
        /// Approval token from the bias check
        #[arg(short, long)]
        token: String,
    },

    /// Public view of every trial
    List,

    /// Full record of every trial (privileged organizations)
    ListFull,

    /// Show one trial at a tier
    Show {
        /// Trial id
        trial_id: String,
        /// Projection tier
        #[arg(long, value_enum, default_value_t = Tier::Public)]
        tier: Tier,
    },

    /// Request anonymized access to a trial
    Request {
        /// Trial id
        trial_id: String,
        /// Research purpose
        #[arg(short, long)]
        purpose: String,
    },

    /// Vote on an access request
    Vote {
        /// Request id
        request_id: String,
        /// approve or reject
        #[arg(short, long)]
        decision: String,
        /// Optional comments
        #[arg(short, long, default_value = "")]
        comments: String,
    },

    /// Show one access request
    Status {
        /// Request id
        request_id: String,
    },

    /// List pending access requests
    Requests,

    /// Commit history of a trial (privileged organizations)
    History {
        /// Trial id
        trial_id: String,
    },
}

/// Projection tier for `show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tier {
    Public,
    Anonymized,
    Full,
}

/// Result of one command.
#[derive(Debug)]
pub struct Outcome {
    /// Printed as pretty JSON
    pub output: Value,
    /// Whether the ledger changed and the snapshot must be rewritten
    pub committed: bool,
}

impl Outcome {
    fn read(output: Value) -> Self {
        Self {
            output,
            committed: false,
        }
    }

    fn write(output: Value) -> Self {
        Self {
            output,
            committed: true,
        }
    }
}

impl Commands {
    /// Transaction id used when none is given on the command line.
    ///
    /// Seeding derives it from ledger state so every peer seeding the same
    /// ledger agrees on it; other commands mint a random one.
    pub fn default_tx_id(&self, ledger: &InMemoryLedger) -> String {
        match self {
            Self::Init => ledger.derive_tx_id("init"),
            _ => uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Execute a command as one ledger invocation.
pub fn execute_command(
    contract: &TrialLedger,
    ledger: &mut InMemoryLedger,
    ctx: &InvocationContext,
    command: Commands,
) -> anyhow::Result<Outcome> {
    let tx_id = ctx.tx_id.clone();
    let at = ctx.timestamp;

    match command {
        Commands::Init => {
            let written = ledger.execute(tx_id, at, |tx| contract.init_ledger(tx))?;
            info!(written, "Seeded sample trials");
            let output = json!({ "written": written });
            if written == 0 {
                Ok(Outcome::read(output))
            } else {
                Ok(Outcome::write(output))
            }
        }

        Commands::Admit { draft, token } => {
            let draft_json = std::fs::read_to_string(&draft)
                .with_context(|| format!("reading draft {}", draft.display()))?;
            let trial_id = ledger.execute(tx_id, at, |tx| {
                contract.submit_trial(tx, &draft_json, &token, ctx)
            })?;
            Ok(Outcome::write(json!({ "trialId": trial_id })))
        }

        Commands::List => {
            let tx = ledger.transaction(tx_id, at);
            let views = contract.public_trials(&tx)?;
            Ok(Outcome::read(serde_json::to_value(views)?))
        }

        Commands::ListFull => {
            let tx = ledger.transaction(tx_id, at);
            let records = contract.all_trials(&tx, ctx)?;
            Ok(Outcome::read(serde_json::to_value(records)?))
        }

        Commands::Show { trial_id, tier } => {
            let tx = ledger.transaction(tx_id, at);
            let output = match tier {
                Tier::Public => serde_json::to_value(contract.public_trial(&tx, &trial_id)?)?,
                Tier::Anonymized => {
                    serde_json::to_value(contract.anonymized_trial(&tx, &trial_id, ctx)?)?
                }
                Tier::Full => serde_json::to_value(contract.full_trial(&tx, &trial_id, ctx)?)?,
            };
            Ok(Outcome::read(output))
        }

        Commands::Request { trial_id, purpose } => {
            let request_id = ledger.execute(tx_id, at, |tx| {
                contract.request_access(tx, &trial_id, &purpose, ctx)
            })?;
            Ok(Outcome::write(json!({ "requestId": request_id })))
        }

        Commands::Vote {
            request_id,
            decision,
            comments,
        } => {
            let status = ledger.execute(tx_id, at, |tx| {
                contract.vote_on_access(tx, &request_id, &decision, &comments, ctx)
            })?;
            Ok(Outcome::write(json!({
                "requestId": request_id,
                "status": status,
            })))
        }

        Commands::Status { request_id } => {
            let tx = ledger.transaction(tx_id, at);
            let request = contract.access_request(&tx, &request_id)?;
            Ok(Outcome::read(serde_json::to_value(request)?))
        }

        Commands::Requests => {
            let tx = ledger.transaction(tx_id, at);
            let pending = contract.pending_requests(&tx)?;
            Ok(Outcome::read(serde_json::to_value(pending)?))
        }

        Commands::History { trial_id } => {
            let tx = ledger.transaction(tx_id, at);
            let history = contract.audit_trail(&tx, &trial_id, ctx)?;
            Ok(Outcome::read(serde_json::to_value(history)?))
        }
    }
}
