//! Tessera: operator CLI for a file-backed audit log.
//!
//! Records events, verifies the hash chain, traces correlated events, and
//! produces compliance reports and audit-ready exports.  All output is JSON
//! on stdout so it can be piped into other tooling.
//!
//! Usage:
//!   tessera --log audit.jsonl log --type access-denied --user alice \
//!       --resource doc-42 --action read --meta reason=\"no-grant\"
//!   tessera --log audit.jsonl verify
//!   tessera --log audit.jsonl report --from 2024-01-01T00:00:00Z --to 2024-02-01T00:00:00Z
//!   tessera --config tessera.toml trace 6c1b…
//!   tessera new-correlation-id

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tessera_audit::{AuditTrail, EventRequest, TrailConfig};
use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    event::EventType,
    metadata::Metadata,
    report::ReportQuery,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Tessera: tamper-evident audit trail.
#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Record, verify, and report on a hash-chained audit log",
    long_about = "Operates on an append-only JSONL audit log whose events are linked\n\
                  by SHA-256 hashes.  Any edit, deletion or reordering of a past\n\
                  event is reported by `verify`."
)]
struct Cli {
    /// TOML configuration file (chain, store and report sections).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSONL audit log; overrides `[store] path` from the config.
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append one event to the log.
    Log(LogArgs),
    /// Verify the whole chain; exits with status 2 if it is broken.
    Verify,
    /// Compliance report over a time range.
    Report(ReportArgs),
    /// Report plus chain verification, as one audit-ready document.
    Export(ReportArgs),
    /// All events sharing a correlation id, in log order.
    Trace {
        correlation_id: String,
    },
    /// Print a fresh correlation id.
    NewCorrelationId,
}

#[derive(Args)]
struct LogArgs {
    /// Event type, e.g. `access-denied` or `custom:model-retrained`.
    #[arg(long = "type")]
    event_type: EventType,
    #[arg(long)]
    user: String,
    #[arg(long)]
    resource: String,
    #[arg(long)]
    action: String,
    /// Metadata entry `key=value`; values are parsed as JSON primitives,
    /// falling back to a plain string.  Repeatable.
    #[arg(long = "meta", value_parser = parse_meta)]
    meta: Vec<(String, Value)>,
    #[arg(long)]
    correlation_id: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    /// Inclusive start, RFC 3339.
    #[arg(long)]
    from: DateTime<Utc>,
    /// Inclusive end, RFC 3339.
    #[arg(long)]
    to: DateTime<Utc>,
    /// Restrict to these event types.  Repeatable.
    #[arg(long = "type")]
    event_types: Vec<EventType>,
    #[arg(long)]
    user: Option<String>,
}

impl ReportArgs {
    fn query(&self) -> ReportQuery {
        let mut query = ReportQuery::between(self.from, self.to);
        if !self.event_types.is_empty() {
            query = query.with_event_types(self.event_types.iter().cloned());
        }
        if let Some(user) = &self.user {
            query = query.with_user(user.clone());
        }
        query
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Structured logging to stderr.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("tessera: {}", e);
            if e.is_retryable() {
                eprintln!("tessera: the log is unchanged; the command can be retried");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> TesseraResult<ExitCode> {
    if let Command::NewCorrelationId = cli.command {
        println!("{}", AuditTrail::generate_correlation_id());
        return Ok(ExitCode::SUCCESS);
    }

    let trail = open_trail(cli.config.as_deref(), cli.log)?;

    match cli.command {
        Command::Log(args) => {
            let meta: Map<String, Value> = args.meta.into_iter().collect();
            let metadata = Metadata::try_from(Value::Object(meta))?;
            let mut request =
                EventRequest::new(args.event_type, args.user, args.resource, args.action)
                    .with_metadata(metadata);
            if let Some(correlation_id) = args.correlation_id {
                request = request.with_correlation_id(correlation_id);
            }
            print_json(&trail.record(request)?)?;
        }
        Command::Verify => {
            let outcome = trail.verify()?;
            print_json(&outcome)?;
            if !outcome.valid {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Report(args) => print_json(&trail.report(&args.query())?)?,
        Command::Export(args) => {
            let export = trail.export(&args.query())?;
            print_json(&export)?;
            if !export.audit_ready {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Trace { correlation_id } => {
            print_json(&trail.events_for_correlation(&correlation_id)?)?
        }
        Command::NewCorrelationId => unreachable!("handled before opening the log"),
    }

    Ok(ExitCode::SUCCESS)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn open_trail(config_path: Option<&Path>, log: Option<PathBuf>) -> TesseraResult<AuditTrail> {
    let mut config = match config_path {
        Some(path) => TrailConfig::from_file(path)?,
        None => TrailConfig::default(),
    };
    if log.is_some() {
        config.store.path = log;
    }
    let Some(path) = &config.store.path else {
        return Err(TesseraError::Config {
            reason: "no audit log configured: pass --log or set [store] path".to_string(),
        });
    };
    debug!(path = %path.display(), "opening audit log");
    AuditTrail::from_config(&config)
}

fn parse_meta(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn print_json<T: serde::Serialize>(value: &T) -> TesseraResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| TesseraError::Serialization {
        reason: format!("failed to render output: {}", e),
    })?;
    println!("{}", rendered);
    Ok(())
}
