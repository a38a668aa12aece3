// crates/publish-gate-cli/src/main.rs
// ============================================================================
// Module: Publish Gate CLI Entry Point
// Description: Command dispatcher for pipeline runs and evidence queries.
// Purpose: Run the publish pipeline and inspect its ledger from the shell.
// Dependencies: clap, publish-gate-cli, publish-gate-config, publish-gate-core,
//               publish-gate-providers, tracing-subscriber
// ============================================================================

//! ## Overview
//! `publish-gate run` executes one pipeline run and records it. `verify`
//! checks a signed manifest offline. `ledger` answers read-only evidence
//! queries and issues inclusion receipts. Exit codes: `0` success, `1` a
//! recorded run that did not succeed (or a failed verification or broken
//! chain), `2` configuration, pre-flight, or ledger errors.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use publish_gate_cli::build_pipeline;
use publish_gate_cli::open_ledger;
use publish_gate_cli::write_reports;
use publish_gate_config::PipelineConfig;
use publish_gate_core::CancellationToken;
use publish_gate_core::EvidenceLedger;
use publish_gate_core::EvidenceRecord;
use publish_gate_core::LedgerEntry;
use publish_gate_core::Manifest;
use publish_gate_core::ManifestVerifier;
use publish_gate_core::PipelineError;
use publish_gate_core::RunRequest;
use publish_gate_core::Timestamp;
use publish_gate_core::TraceId;
use publish_gate_providers::Ed25519Verifier;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a manifest JSON input.
const MAX_MANIFEST_BYTES: usize = 16 * 1024 * 1024;
/// Environment variable holding the log filter.
const LOG_ENV: &str = "PUBLISH_GATE_LOG";
/// Exit code for recorded runs that did not succeed.
const EXIT_RUN_FAILED: u8 = 1;
/// Exit code for configuration, pre-flight, and ledger errors.
const EXIT_SETUP_FAILED: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "publish-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one pipeline run and record it.
    Run(RunCommand),
    /// Verify a signed manifest offline.
    Verify(VerifyCommand),
    /// Query the evidence ledger.
    Ledger {
        /// Ledger subcommand.
        #[command(subcommand)]
        command: LedgerCommand,
    },
    /// Configuration utilities.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config file selection shared by commands that load configuration.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Path to `publish-gate.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Trace id of a prior attempt this run supersedes.
    #[arg(long, value_name = "TRACE_ID")]
    supersedes: Option<String>,
    /// Explicit trace id (generated when omitted).
    #[arg(long, value_name = "TRACE_ID")]
    trace_id: Option<String>,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
struct VerifyCommand {
    /// Path to the signed manifest JSON file.
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,
    /// Path to the signer's Ed25519 public key.
    #[arg(long, value_name = "PATH")]
    public_key: PathBuf,
}

/// Ledger subcommands.
#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Print the evidence record for one trace id.
    Show(LedgerShowCommand),
    /// Print evidence records started within a time range.
    List(LedgerListCommand),
    /// Recompute the hash chain and report tampering.
    Verify(LedgerVerifyCommand),
    /// Print an inclusion receipt for one trace id.
    Receipt(LedgerReceiptCommand),
}

/// Arguments for `ledger show`.
#[derive(Args, Debug)]
struct LedgerShowCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Trace id to look up.
    #[arg(long, value_name = "TRACE_ID")]
    trace_id: String,
}

/// Arguments for `ledger list`.
#[derive(Args, Debug)]
struct LedgerListCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Inclusive lower bound on start time (unix milliseconds).
    #[arg(long, value_name = "MS", default_value_t = 0)]
    from: i64,
    /// Inclusive upper bound on start time (unix milliseconds).
    #[arg(long, value_name = "MS", default_value_t = i64::MAX)]
    to: i64,
}

/// Arguments for `ledger verify`.
#[derive(Args, Debug)]
struct LedgerVerifyCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Arguments for `ledger receipt`.
#[derive(Args, Debug)]
struct LedgerReceiptCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Trace id to issue a receipt for.
    #[arg(long, value_name = "TRACE_ID")]
    trace_id: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigArgs),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying the exit code to report.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
    /// Process exit code.
    code: u8,
}

impl CliError {
    /// Constructs a setup error (exit code 2).
    const fn setup(message: String) -> Self {
        Self {
            message,
            code: EXIT_SETUP_FAILED,
        }
    }

    /// Constructs a run failure (exit code 1).
    const fn failed(message: String) -> Self {
        Self {
            message,
            code: EXIT_RUN_FAILED,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Installs the stderr log subscriber.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(command) => command_run(&command),
        Commands::Verify(command) => command_verify(&command),
        Commands::Ledger {
            command,
        } => match command {
            LedgerCommand::Show(command) => command_ledger_show(&command),
            LedgerCommand::List(command) => command_ledger_list(&command),
            LedgerCommand::Verify(command) => command_ledger_verify(&command),
            LedgerCommand::Receipt(command) => command_ledger_receipt(&command),
        },
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(args) => command_config_validate(&args),
        },
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let request = RunRequest {
        trace_id: command.trace_id.as_deref().map(parse_trace_id).transpose()?,
        supersedes: command.supersedes.as_deref().map(parse_trace_id).transpose()?,
    };
    let pipeline = build_pipeline(&config).map_err(|err| CliError::setup(err.to_string()))?;

    let outcome = match pipeline.run(request, &CancellationToken::new()) {
        Ok(outcome) => outcome,
        Err(err @ (PipelineError::Integrity { .. } | PipelineError::Signing { .. })) => {
            return Err(CliError::failed(err.to_string()));
        }
        Err(PipelineError::LedgerWrite {
            message,
            run,
            fallback,
        }) => {
            let evidence = EvidenceRecord::from_run(None, &run)
                .map_err(|err| CliError::setup(err.to_string()))?;
            write_json(&evidence)?;
            let location = fallback.unwrap_or_else(|| "none".to_string());
            return Err(CliError::setup(format!(
                "ledger write failed for {}: {message} (fallback: {location})",
                run.trace_id
            )));
        }
        Err(err) => return Err(CliError::setup(err.to_string())),
    };

    info!(
        record_id = %outcome.record_id,
        trace_id = %outcome.run.trace_id,
        terminal = outcome.run.terminal.as_str(),
        "run recorded"
    );
    if let Some(dir) = &config.pipeline.report_dir {
        let sbom = config.pipeline.sbom.as_ref().map(|path| config.resolve(path));
        let written = write_reports(&config.resolve(dir), &outcome, sbom.as_deref())
            .map_err(|err| CliError::setup(err.to_string()))?;
        info!(path = %written.deploy.display(), "deploy report written");
        if let Some(path) = &written.provenance {
            info!(path = %path.display(), "provenance statement written");
        }
    }
    let evidence = EvidenceRecord::from_run(Some(outcome.record_id), &outcome.run)
        .map_err(|err| CliError::setup(err.to_string()))?;
    write_json(&evidence)?;
    if outcome.run.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_RUN_FAILED))
    }
}

// ============================================================================
// SECTION: Verify Command
// ============================================================================

/// Executes the `verify` command.
fn command_verify(command: &VerifyCommand) -> CliResult<ExitCode> {
    let bytes = read_bytes_with_limit(&command.manifest, MAX_MANIFEST_BYTES).map_err(|err| {
        CliError::setup(format!("unable to read {}: {err}", command.manifest.display()))
    })?;
    let manifest: Manifest = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::setup(format!("invalid manifest json: {err}")))?;
    let verifier = Ed25519Verifier::from_file(&command.public_key)
        .map_err(|err| CliError::setup(err.to_string()))?;
    let report = ManifestVerifier::new(&verifier).verify(&manifest);
    write_json(&report)?;
    if report.is_valid() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::from(EXIT_RUN_FAILED)) }
}

// ============================================================================
// SECTION: Ledger Commands
// ============================================================================

/// Executes `ledger show`.
fn command_ledger_show(command: &LedgerShowCommand) -> CliResult<ExitCode> {
    let trace_id = parse_trace_id(&command.trace_id)?;
    let ledger = open_configured_ledger(&command.config)?;
    let Some(entry) = ledger.get(&trace_id).map_err(|err| CliError::setup(err.to_string()))?
    else {
        return Err(CliError::failed(format!("no ledger record for trace id {trace_id}")));
    };
    write_json(&evidence_of(&entry)?)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `ledger list`.
fn command_ledger_list(command: &LedgerListCommand) -> CliResult<ExitCode> {
    if command.from > command.to {
        return Err(CliError::setup("--from must not exceed --to".to_string()));
    }
    let ledger = open_configured_ledger(&command.config)?;
    let entries = ledger
        .list_by_time_range(
            Timestamp::from_unix_millis(command.from),
            Timestamp::from_unix_millis(command.to),
        )
        .map_err(|err| CliError::setup(err.to_string()))?;
    let records = entries.iter().map(evidence_of).collect::<CliResult<Vec<_>>>()?;
    write_json(&records)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `ledger verify`.
fn command_ledger_verify(command: &LedgerVerifyCommand) -> CliResult<ExitCode> {
    let ledger = open_configured_ledger(&command.config)?;
    let report = ledger.verify_chain().map_err(|err| CliError::setup(err.to_string()))?;
    write_json(&report)?;
    if report.is_intact() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::from(EXIT_RUN_FAILED)) }
}

/// Executes `ledger receipt`.
fn command_ledger_receipt(command: &LedgerReceiptCommand) -> CliResult<ExitCode> {
    let trace_id = parse_trace_id(&command.trace_id)?;
    let ledger = open_configured_ledger(&command.config)?;
    let Some(receipt) = ledger.receipt(&trace_id).map_err(|err| CliError::setup(err.to_string()))?
    else {
        return Err(CliError::failed(format!("no ledger record for trace id {trace_id}")));
    };
    write_json(&receipt)?;
    if receipt.chain_intact { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::from(EXIT_RUN_FAILED)) }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config validate`.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    load_config(args)?;
    write_stdout_line("config ok").map_err(|err| CliError::setup(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<PipelineConfig> {
    PipelineConfig::load(args.config.as_deref()).map_err(|err| CliError::setup(err.to_string()))
}

/// Loads configuration and opens its ledger.
fn open_configured_ledger(
    args: &ConfigArgs,
) -> CliResult<publish_gate_store_sqlite::SqliteEvidenceLedger> {
    let config = load_config(args)?;
    open_ledger(&config).map_err(|err| CliError::setup(err.to_string()))
}

/// Parses a trace id argument.
fn parse_trace_id(value: &str) -> CliResult<TraceId> {
    TraceId::parse(value).map_err(|err| CliError::setup(err.to_string()))
}

/// Projects a ledger entry into its evidence record.
fn evidence_of(entry: &LedgerEntry) -> CliResult<EvidenceRecord> {
    EvidenceRecord::from_run(Some(entry.record_id), &entry.run)
        .map_err(|err| CliError::setup(err.to_string()))
}

/// Errors returned by bounded file reads.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// File I/O failure.
    #[error("{0}")]
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    #[error("file size {size} exceeds limit {limit}")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::setup(format!("json serialization failed: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::setup(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns its exit code.
fn emit_error(err: &CliError) -> ExitCode {
    let _ = write_stderr_line(&err.message);
    ExitCode::from(err.code)
}
