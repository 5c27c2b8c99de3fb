//! Beacon CLI
//!
//! Operator entry point for the out-of-process side of the agent:
//! - `drain`: ship the on-disk journal once
//! - `daemon`: repeat drain passes on an interval
//! - `status` / `sweep`: inspect and prune the journal directory
//! - `config`: show, validate and describe configuration

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use beacon_common::{OutputFormat, AGENT_VERSION, SCHEMA_VERSION};
use beacon_config::{load_config, AgentConfig, ConfigError, ConfigOptions, ResolvedConfig};
use beacon_core::agent::open_journal;
use beacon_core::daemon::{install_signal_handlers, Daemon, DaemonOptions};
use beacon_core::drain::{DrainOptions, Drainer};
use beacon_core::exit_codes::ExitCode;
use beacon_core::log_event;
use beacon_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use beacon_core::sender::Sender;
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

/// Beacon telemetry agent: journal drain and diagnostics
#[derive(Parser)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to beacon.json (otherwise BEACON_CONFIG, XDG, /etc/beacon)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ship the on-disk journal to the collector once
    Drain(DrainArgs),

    /// Drain the journal repeatedly until interrupted
    Daemon(DaemonArgs),

    /// Show journal and configuration state
    Status,

    /// Delete rotated journal files past their TTL
    Sweep,

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct DrainArgs {
    /// Events per delivery request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Adopt processing files left behind by a previous drain
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct DaemonArgs {
    /// Seconds to sleep between drain passes
    #[arg(long)]
    interval: Option<u64>,

    /// Stop after this many passes
    #[arg(long)]
    max_runs: Option<u64>,

    /// Events per delivery request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Adopt processing files left behind by a previous drain
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration (secrets masked)
    Show,
    /// Print the JSON schema for beacon.json
    Schema,
    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the resolved config)
        path: Option<PathBuf>,
    },
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Clean,
                _ => ExitCode::ArgsError,
            };
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    let base = LogConfig::from_env(None, cli.global.log_format);
    let level = if cli.global.quiet {
        LogLevel::Error
    } else {
        base.level.louder(cli.global.verbose)
    };
    init_logging(&base.with_level(level));

    let exit_code = match &cli.command {
        Commands::Drain(args) => run_drain(&cli.global, args),
        Commands::Daemon(args) => run_daemon(&cli.global, args),
        Commands::Status => run_status(&cli.global),
        Commands::Sweep => run_sweep(&cli.global),
        Commands::Config(args) => run_config(&cli.global, args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Commands
// ============================================================================

fn new_log_context() -> LogContext {
    LogContext::new(generate_run_id(), get_host_id())
}

fn run_drain(global: &GlobalOpts, args: &DrainArgs) -> ExitCode {
    let ctx = new_log_context();
    let resolved = match resolve_config(global, &ctx, None) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let config = &resolved.config;

    let journal = open_journal(config);
    let sender = Sender::from_config(config);
    let options = DrainOptions {
        batch_size: args.batch_size.unwrap_or(config.drain.batch_size),
        force: args.force,
    };

    log_event!(
        ctx,
        INFO,
        event_names::DRAIN_STARTED,
        Stage::Drain,
        "drain started",
        journal = tracing::field::display(journal.dir().display()),
        batch_size = options.batch_size
    );

    match Drainer::new(&journal, &sender, options).run() {
        Ok(report) => {
            let code = report.exit_code();
            log_event!(
                ctx,
                INFO,
                event_names::DRAIN_FINISHED,
                Stage::Drain,
                "drain finished",
                files = report.files_drained,
                events_sent = report.events_sent,
                events_rejected = report.events_rejected,
                events_requeued = report.events_requeued
            );
            let result = serde_json::to_value(&report).unwrap_or(Value::Null);
            emit(global, &ctx, "drain", code, result, || {
                println!("# Journal Drain");
                println!();
                println!("Status:    {:?}", report.status);
                println!("Files:     {}", report.files_drained);
                println!(
                    "Sent:      {} events in {} batches",
                    report.events_sent, report.batches_sent
                );
                if report.events_rejected > 0 {
                    println!("Rejected:  {} events (dropped)", report.events_rejected);
                }
                if report.events_requeued > 0 {
                    println!("Requeued:  {} events", report.events_requeued);
                }
                if report.lines_skipped > 0 {
                    println!("Skipped:   {} undecodable lines", report.lines_skipped);
                }
            });
            code
        }
        Err(e) => {
            let code = e.exit_code();
            if code == ExitCode::LockError {
                log_event!(
                    ctx,
                    WARN,
                    event_names::DRAIN_LOCK_HELD,
                    Stage::Drain,
                    "journal is already being drained"
                );
            } else {
                log_event!(
                    ctx,
                    ERROR,
                    event_names::INTERNAL_ERROR,
                    Stage::Drain,
                    "drain failed",
                    error = tracing::field::display(&e)
                );
            }
            emit_error(global, &ctx, "drain", code, &e.to_string());
            code
        }
    }
}

fn run_daemon(global: &GlobalOpts, args: &DaemonArgs) -> ExitCode {
    let ctx = new_log_context();
    let resolved = match resolve_config(global, &ctx, Some(Stage::Daemon)) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let config = &resolved.config;

    let journal = open_journal(config);
    let sender = Sender::from_config(config);
    let options = DaemonOptions {
        interval: args
            .interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.drain.interval()),
        max_runs: args.max_runs,
        drain: DrainOptions {
            batch_size: args.batch_size.unwrap_or(config.drain.batch_size),
            force: args.force,
        },
    };

    install_signal_handlers();
    let stop = AtomicBool::new(false);
    let summary = Daemon::new(&journal, &sender, options, &ctx).run(&stop);

    let result = serde_json::to_value(&summary).unwrap_or(Value::Null);
    emit(global, &ctx, "daemon", ExitCode::Clean, result, || {
        println!("# Drain Daemon");
        println!();
        println!("Passes:    {}", summary.passes);
        println!("Sent:      {} events", summary.events_sent);
        println!("Failed:    {} passes", summary.failed_passes);
        println!("Skipped:   {} passes (journal busy)", summary.skipped_passes);
    });
    ExitCode::Clean
}

fn run_status(global: &GlobalOpts) -> ExitCode {
    let ctx = new_log_context();
    let resolved = match resolve_config(global, &ctx, None) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let snapshot = resolved.snapshot();
    let journal = open_journal(&resolved.config);

    let status = match journal.status() {
        Ok(status) => status,
        Err(e) => {
            emit_error(global, &ctx, "status", ExitCode::IoError, &e.to_string());
            return ExitCode::IoError;
        }
    };

    let result = json!({ "config": &snapshot, "journal": &status });
    emit(global, &ctx, "status", ExitCode::Clean, result, || {
        println!("# Beacon Status");
        println!();
        println!("Enabled:      {}", snapshot.enabled);
        println!("Backend:      {}", snapshot.backend.as_str());
        println!("Delivery:     {}", configured(snapshot.delivery_configured));
        println!("Journal:      {}", status.dir.display());
        println!(
            "  live:       {} events ({} bytes)",
            status.live_lines, status.live_bytes
        );
        println!(
            "  rotated:    {} files ({} bytes)",
            status.rotated_files, status.rotated_bytes
        );
        if !status.processing_files.is_empty() {
            println!("  processing: {}", status.processing_files.join(", "));
        }
    });
    ExitCode::Clean
}

fn run_sweep(global: &GlobalOpts) -> ExitCode {
    let ctx = new_log_context();
    let resolved = match resolve_config(global, &ctx, Some(Stage::Sweep)) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let journal = open_journal(&resolved.config);

    match journal.sweep() {
        Ok(removed) => {
            log_event!(
                ctx,
                INFO,
                event_names::SWEEP_FINISHED,
                Stage::Sweep,
                "sweep finished",
                removed = removed.len()
            );
            let result = json!({ "removed": removed.len(), "files": &removed });
            emit(global, &ctx, "sweep", ExitCode::Clean, result, || {
                println!("# Journal Sweep");
                println!();
                if removed.is_empty() {
                    println!("Nothing past its TTL.");
                }
                for event in &removed {
                    println!(
                        "removed {} ({} bytes, {}s old)",
                        event.file_name, event.size_bytes, event.age_secs
                    );
                }
            });
            ExitCode::Clean
        }
        Err(e) => {
            emit_error(global, &ctx, "sweep", ExitCode::IoError, &e.to_string());
            ExitCode::IoError
        }
    }
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    let ctx = new_log_context();
    match &args.command {
        ConfigCommands::Show => match resolve_config(global, &ctx, None) {
            Ok(resolved) => {
                let snapshot = resolved.snapshot();
                let effective = resolved.config.redacted();
                let result = json!({ "snapshot": &snapshot, "config": &effective });
                emit(global, &ctx, "config show", ExitCode::Clean, result, || {
                    println!("# Configuration");
                    println!();
                    match &snapshot.path {
                        Some(path) => println!("File:     {} ({})", path.display(), resolved.source),
                        None => println!("File:     using built-in defaults"),
                    }
                    if !snapshot.env_overrides.is_empty() {
                        println!("Env:      {}", snapshot.env_overrides.join(", "));
                    }
                    println!("Delivery: {}", configured(snapshot.delivery_configured));
                    println!("Backend:  {}", snapshot.backend.as_str());
                    println!("Journal:  {}", snapshot.journal_dir.display());
                });
                ExitCode::Clean
            }
            Err(code) => code,
        },
        ConfigCommands::Schema => {
            let schema = schemars::schema_for!(AgentConfig);
            print_json(&serde_json::to_value(&schema).unwrap_or(Value::Null));
            ExitCode::Clean
        }
        ConfigCommands::Validate { path } => {
            let path = path.clone().or_else(|| global.config.clone());
            let options = ConfigOptions {
                config_path: path,
                ignore_env: true,
            };
            match load_config(&options) {
                Ok(resolved) => {
                    let result = json!({
                        "status": "valid",
                        "path": resolved.path.as_ref().map(|p| p.display().to_string()),
                        "using_defaults": resolved.path.is_none(),
                        "hash": resolved.hash,
                    });
                    emit(global, &ctx, "config validate", ExitCode::Clean, result, || {
                        println!("# Configuration Validation");
                        println!();
                        println!("Status: valid");
                        match &resolved.path {
                            Some(path) => println!("File:   {}", path.display()),
                            None => println!("File:   using built-in defaults"),
                        }
                    });
                    ExitCode::Clean
                }
                Err(e) => output_config_error(global, &ctx, &e),
            }
        }
    }
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "beacon_version": AGENT_VERSION,
        })),
        OutputFormat::Exitcode => {}
        OutputFormat::Human => {
            println!("beacon {}", AGENT_VERSION);
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Load configuration, reporting failures in the requested format.
fn resolve_config(
    global: &GlobalOpts,
    ctx: &LogContext,
    stage: Option<Stage>,
) -> Result<ResolvedConfig, ExitCode> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        ignore_env: false,
    };
    match load_config(&options) {
        Ok(resolved) => {
            let stage = stage.unwrap_or(Stage::Init);
            match &resolved.path {
                Some(path) => log_event!(
                    ctx,
                    INFO,
                    event_names::CONFIG_LOADED,
                    stage,
                    "configuration loaded",
                    path = tracing::field::display(path.display()),
                    source = resolved.source.as_str()
                ),
                None => log_event!(
                    ctx,
                    INFO,
                    event_names::CONFIG_DEFAULT_USED,
                    stage,
                    "no config file found; using defaults"
                ),
            }
            Ok(resolved)
        }
        Err(e) => Err(output_config_error(global, ctx, &e)),
    }
}

fn output_config_error(global: &GlobalOpts, ctx: &LogContext, error: &ConfigError) -> ExitCode {
    let code = match error {
        ConfigError::IoError { .. } => ExitCode::IoError,
        _ => ExitCode::ConfigError,
    };
    log_event!(
        ctx,
        ERROR,
        event_names::CONFIG_ERROR,
        Stage::Init,
        "configuration error",
        error = tracing::field::display(error)
    );
    emit_error(global, ctx, "config", code, &error.to_string());
    code
}

/// Write a command result to stdout in the requested format.
fn emit(
    global: &GlobalOpts,
    ctx: &LogContext,
    command: &str,
    code: ExitCode,
    result: Value,
    human: impl FnOnce(),
) {
    match global.format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "run_id": ctx.run_id,
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "command": command,
            "exit_code": code.as_i32(),
            "exit_code_name": code.code_name(),
            "result": result,
        })),
        OutputFormat::Exitcode => {}
        OutputFormat::Human => human(),
    }
}

/// Write a command failure to stderr in the requested format.
fn emit_error(global: &GlobalOpts, ctx: &LogContext, command: &str, code: ExitCode, message: &str) {
    match global.format {
        OutputFormat::Json => {
            let response = json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "command": command,
                "status": "error",
                "error": {
                    "code": code.as_i32(),
                    "name": code.code_name(),
                    "message": message,
                }
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{}", message),
            }
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Human => eprintln!("beacon {}: {}", command, message),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}

fn configured(yes: bool) -> &'static str {
    if yes {
        "configured"
    } else {
        "not configured (events stay buffered)"
    }
}
