//! poll-relay command line.
//!
//! ```text
//!   identity ──▶ derivation ──▶ funding ──▶ submitter ──▶ node
//!                                  ▲             │
//!                         controller account     └──▶ receipt ──▶ JSON on stdout
//! ```
//!
//! Logs go to stderr; every command prints one JSON document to stdout.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

use poll_relay::blockchain::derivation::{derive, DerivationSecret};
use poll_relay::config::{load_config, load_from_env, ObservabilityConfig, RelayConfig};
use poll_relay::error::RelayResult;
use poll_relay::lifecycle::bootstrap;
use poll_relay::observability::{logging, metrics};
use poll_relay::voting::PollRef;

#[derive(Parser)]
#[command(name = "poll-relay")]
#[command(about = "Submit poll and vote transactions on behalf of chat users", long_about = None)]
struct Cli {
    /// TOML config file. Without it, defaults plus environment overrides are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the account address derived for an identity (offline)
    Address { identity: String },
    /// Create a poll from the controller account
    Create {
        #[arg(long)]
        question: String,
        /// Repeat once per answer
        #[arg(long = "answer", required = true)]
        answers: Vec<String>,
        /// Allow selecting more than one answer
        #[arg(long)]
        multiple: bool,
        /// Unix timestamp voting opens; defaults to the latest block time
        #[arg(long)]
        start: Option<u64>,
        /// Voting window in seconds
        #[arg(long)]
        duration: u64,
    },
    /// Vote on behalf of an identity
    Vote {
        identity: String,
        /// Poll id or creation transaction hash
        poll: PollRef,
        /// Zero-based answer indices
        #[arg(required = true)]
        answers: Vec<u32>,
    },
    /// Cancel a poll
    Cancel { poll: PollRef },
    /// Move a poll's voting window
    Reschedule {
        poll: PollRef,
        #[arg(long)]
        start: u64,
        #[arg(long)]
        duration: u64,
    },
    /// Show a poll and its status
    Info { poll: PollRef },
    /// Show vote counts per answer
    Results { poll: PollRef },
    /// Show the answers an identity selected
    Votes { poll: PollRef, identity: String },
    /// List active poll ids
    Active,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Derivation needs neither config nor a node.
    if let Commands::Address { identity } = &cli.command {
        logging::init_logging(&ObservabilityConfig::default());
        return emit(address(identity));
    }

    let loaded = match &cli.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("poll-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Metrics disabled");
                }
            }
            Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
        }
    }

    emit(run(cli.command, &config).await)
}

fn address(identity: &str) -> RelayResult<Value> {
    let secret = DerivationSecret::from_env()?;
    let account = derive(&secret, identity)?;
    Ok(json!({ "identity": identity, "address": account.address() }))
}

async fn run(command: Commands, config: &RelayConfig) -> RelayResult<Value> {
    let service = bootstrap(config).await?;

    match command {
        Commands::Address { identity } => address(&identity),
        Commands::Create {
            question,
            answers,
            multiple,
            start,
            duration,
        } => {
            let start = match start {
                Some(start) => start,
                None => service.chain_time().await?,
            };
            let created = service
                .create_poll(question, answers, multiple, start, duration)
                .await?;
            Ok(json!(created))
        }
        Commands::Vote {
            identity,
            poll,
            answers,
        } => {
            let poll_id = service.resolve_poll_id(poll).await?;
            let tx_hash = service.vote(&identity, poll_id, answers).await?;
            Ok(json!({ "poll_id": poll_id, "tx_hash": tx_hash }))
        }
        Commands::Cancel { poll } => {
            let poll_id = service.resolve_poll_id(poll).await?;
            let tx_hash = service.cancel_poll(poll_id).await?;
            Ok(json!({ "poll_id": poll_id, "tx_hash": tx_hash }))
        }
        Commands::Reschedule {
            poll,
            start,
            duration,
        } => {
            let poll_id = service.resolve_poll_id(poll).await?;
            let tx_hash = service.reschedule(poll_id, start, duration).await?;
            Ok(json!({ "poll_id": poll_id, "tx_hash": tx_hash }))
        }
        Commands::Info { poll } => {
            let poll_id = service.resolve_poll_id(poll).await?;
            let info = service.poll_info(poll_id).await?;
            let status = info.status(service.chain_time().await?);
            Ok(json!({ "poll_id": poll_id, "status": status, "poll": info }))
        }
        Commands::Results { poll } => {
            let poll_id = service.resolve_poll_id(poll).await?;
            let info = service.poll_info(poll_id).await?;
            let counts = service.results_for(poll_id, &info).await?;
            let results: Vec<Value> = info
                .answers
                .iter()
                .zip(&counts)
                .map(|(answer, votes)| json!({ "answer": answer, "votes": votes }))
                .collect();
            Ok(json!({ "poll_id": poll_id, "question": info.question, "results": results }))
        }
        Commands::Votes { poll, identity } => {
            let poll_id = service.resolve_poll_id(poll).await?;
            let selected = service.user_votes(poll_id, &identity).await?;
            Ok(json!({ "poll_id": poll_id, "identity": identity, "answers": selected }))
        }
        Commands::Active => Ok(json!({ "active": service.active_polls().await? })),
    }
}

fn emit(result: RelayResult<Value>) -> ExitCode {
    match result {
        Ok(value) => {
            println!("{}", pretty(&value));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            println!("{}", pretty(&json!({ "error": e.to_string() })));
            ExitCode::FAILURE
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
