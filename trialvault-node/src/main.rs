//! trialvault-node: operator CLI for the clinical-trial ledger
//!
//! Runs one contract operation per invocation against a JSON snapshot of the
//! in-memory substrate. The snapshot is rewritten only when a write succeeds.

mod cli;
mod snapshot;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

use cli::Commands;
use trialvault::{CallerIdentity, InvocationContext, LedgerConfig, TracingEventSink, TrialLedger};

#[derive(Parser)]
#[command(name = "trialvault-node")]
#[command(about = "Operator CLI for the permissioned clinical-trial ledger")]
struct Cli {
    /// Path to YAML configuration (defaults apply when omitted)
    #[arg(short, long, env = "TRIALVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger snapshot file
    #[arg(short, long, env = "TRIALVAULT_STATE", default_value = "trialvault-state.json")]
    state: PathBuf,

    /// Caller identity
    #[arg(long, env = "TRIALVAULT_CALLER")]
    caller: String,

    /// Caller organization
    #[arg(long, env = "TRIALVAULT_ORG")]
    org: String,

    /// Invocation timestamp, RFC 3339 (defaults to now)
    #[arg(long)]
    timestamp: Option<DateTime<Utc>>,

    /// Transaction id (minted when omitted)
    #[arg(long)]
    tx_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trialvault=info".parse()?)
                .add_directive("trialvault_node=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let contract = TrialLedger::with_events(config, Box::new(TracingEventSink));
    let mut ledger = snapshot::load(&cli.state)?;

    let tx_id = cli
        .tx_id
        .unwrap_or_else(|| cli.command.default_tx_id(&ledger));
    let timestamp = cli.timestamp.unwrap_or_else(Utc::now);
    let ctx = InvocationContext::new(CallerIdentity::new(cli.caller, cli.org), tx_id, timestamp);

    info!(
        caller = %ctx.caller_id(),
        org = %ctx.caller_org(),
        tx_id = %ctx.tx_id,
        "Invoking ledger"
    );

    let outcome = cli::execute_command(&contract, &mut ledger, &ctx, cli.command)?;
    if outcome.committed {
        snapshot::save(&cli.state, &ledger)?;
        info!(height = ledger.height(), "Ledger committed");
    }

    println!("{}", serde_json::to_string_pretty(&outcome.output)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        return Ok(LedgerConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = LedgerConfig::from_yaml(&content)
        .with_context(|| format!("loading config {}", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}
