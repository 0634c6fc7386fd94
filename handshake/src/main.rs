//! Command-line entry point. Prints the banner, guards on the mission secret,
//! runs the check, and records the outcome when a ledger is configured.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use serde_json::json;
use void_handshake::audit::ledger::{IntegrityReport, Ledger, LedgerEntry};
use void_handshake::config::{self, Config, ConfigError, LedgerSettings};
use void_handshake::handshake::{self, MISSING_SECRET, UNREADABLE_SECRET};
use void_handshake::verifier::Verifier;

#[derive(Parser, Debug)]
#[command(name = "void-handshake", version, about = "Mission secret handshake")]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Dotenv file loaded before reading configuration (default: .env)"
    )]
    env_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Audit ledger file (overrides VOID_LEDGER_PATH)"
    )]
    ledger: Option<PathBuf>,
    #[arg(long, help = "Value to check against the secret (default: the secret itself)")]
    candidate: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
}

#[derive(Subcommand, Debug)]
enum LedgerCommands {
    /// Recompute the hash chain and report the first broken line.
    Verify,
    /// Print entries as JSON lines.
    Show {
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    config::load_env_file(cli.env_file.as_deref());

    let outcome = match &cli.command {
        None => run_handshake(&cli),
        Some(Commands::Ledger { command }) => run_ledger(cli.ledger.clone(), command),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("void-handshake failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_handshake(cli: &Cli) -> anyhow::Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    handshake::write_banner(&mut out)?;

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            out.flush()?;
            debug!("{err}");
            match err {
                ConfigError::MissingConfiguration { .. } => eprintln!("{MISSING_SECRET}"),
                ConfigError::NotUnicode { .. } => eprintln!("{UNREADABLE_SECRET}"),
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    let verifier = Verifier::new(&config);
    let candidate = cli.candidate.as_deref().unwrap_or_else(|| verifier.secret());
    let result = handshake::run(&verifier, candidate, &mut out)?;
    out.flush()?;

    let ledger_path = cli.ledger.clone().or_else(|| config.ledger.path.clone());
    if let Some(path) = ledger_path {
        let ledger = Ledger::open(path, config.ledger.key.as_deref())?;
        let entry = ledger
            .append("handshake", json!({ "result": result.as_str() }))
            .context("recording handshake outcome")?;
        info!("outcome recorded as {}", entry.id);
    }

    Ok(ExitCode::SUCCESS)
}

fn run_ledger(path_override: Option<PathBuf>, command: &LedgerCommands) -> anyhow::Result<ExitCode> {
    let settings = LedgerSettings::from_env();
    let path = path_override
        .or(settings.path)
        .ok_or_else(|| anyhow!("no ledger configured; pass --ledger or set VOID_LEDGER_PATH"))?;
    let ledger = Ledger::open(path, settings.key.as_deref())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let code = match command {
        LedgerCommands::Verify => {
            let report = ledger.verify()?;
            write_report(&mut out, &report)?;
            if report.is_ok() {
                ExitCode::SUCCESS
            } else {
                debug!("ledger {} failed verification", ledger.path().display());
                ExitCode::FAILURE
            }
        }
        LedgerCommands::Show { limit } => {
            write_entries(&mut out, &ledger.read_entries(*limit)?)?;
            ExitCode::SUCCESS
        }
    };
    out.flush()?;
    Ok(code)
}

fn write_report(out: &mut impl Write, report: &IntegrityReport) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
    Ok(())
}

fn write_entries(out: &mut impl Write, entries: &[LedgerEntry]) -> anyhow::Result<()> {
    for entry in entries {
        writeln!(out, "{}", serde_json::to_string(entry)?)?;
    }
    Ok(())
}
