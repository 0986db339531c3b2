//! Operator CLI for the goals portal.
//!
//! # Responsibility
//! - Provide a health probe that verifies `goals_portal_core` linkage.
//! - Provision roster pairs and admin grants.
//! - Drive one-time-code sign-in and admin CSV export from a terminal.
//!
//! # Invariants
//! - `--db` overrides `GOALS_PORTAL_DB_PATH`; other settings come from the
//!   environment through `PortalConfig`.
//! - CSV and JSON payloads go to stdout; diagnostics go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use goals_portal_core::db::open_db;
use goals_portal_core::{
    init_logging, ExportKind, ExportService, IdentityProvider, PartName, PortalConfig,
    RecordController, RosterPair, RosterRepository, SessionContext, SqliteIdentityProvider,
    SqliteStore,
};
use log::info;
use rusqlite::Connection;
use std::path::PathBuf;

/// Goals portal administration and smoke tool.
#[derive(Parser)]
#[command(name = "goals_portal")]
#[command(about = "Goals portal operator CLI", long_about = None)]
struct Cli {
    /// SQLite database file (defaults to GOALS_PORTAL_DB_PATH or a temp file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core linkage information.
    Ping,

    /// Provision one roster pair.
    Provision {
        pair_id: String,
        #[arg(long, default_value = "")]
        school: String,
        #[arg(long, default_value = "")]
        educator_email: String,
        #[arg(long, default_value = "")]
        educator_name: String,
        #[arg(long, default_value = "")]
        evaluator_email: String,
        #[arg(long, default_value = "")]
        evaluator_name: String,
        #[arg(long, default_value = "")]
        resolution_email: String,
        #[arg(long, default_value = "")]
        resolution_name: String,
    },

    /// Grant admin (export) access to an email.
    #[command(name = "grant-admin")]
    GrantAdmin { email: String },

    /// Issue a one-time code. Without a mail transport the code is printed.
    #[command(name = "send-code")]
    SendCode { email: String },

    /// Exchange a one-time code for a session token.
    #[command(name = "verify-code")]
    VerifyCode { email: String, code: String },

    /// Print one part as JSON, as seen by the session's user.
    Show {
        /// Session token from `verify-code`
        #[arg(long)]
        session: String,
        pair_id: String,
        #[arg(value_parser = parse_part)]
        part: PartName,
    },

    /// Write an admin CSV export to stdout.
    Export {
        /// Session token from `verify-code`
        #[arg(long)]
        session: String,
        #[arg(long, value_enum, default_value_t = KindArg::Parts)]
        kind: KindArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Parts,
    Roster,
}

impl From<KindArg> for ExportKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Parts => ExportKind::Parts,
            KindArg::Roster => ExportKind::Roster,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = PortalConfig::from_env().context("invalid environment configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(log_dir) = cli.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir).map_err(anyhow::Error::msg)?;
    }

    match cli.command {
        Commands::Ping => {
            println!("goals_portal_core ping={}", goals_portal_core::ping());
            println!(
                "goals_portal_core version={}",
                goals_portal_core::core_version()
            );
        }
        Commands::Provision {
            pair_id,
            school,
            educator_email,
            educator_name,
            evaluator_email,
            evaluator_name,
            resolution_email,
            resolution_name,
        } => {
            let conn = open(&config)?;
            let store = SqliteStore::try_new(&conn)?;
            store
                .insert_pair(&RosterPair {
                    pair_id: pair_id.clone(),
                    school_name: school,
                    educator_email,
                    educator_name,
                    evaluator_email,
                    evaluator_name,
                    resolution_email,
                    resolution_name,
                })
                .with_context(|| format!("failed to provision pair {pair_id}"))?;
            println!("provisioned {}", pair_id.trim());
        }
        Commands::GrantAdmin { email } => {
            let conn = open(&config)?;
            SqliteStore::try_new(&conn)?.grant_admin(&email)?;
            println!("granted admin to {}", email.trim().to_lowercase());
        }
        Commands::SendCode { email } => {
            let conn = open(&config)?;
            let print_code = |email: &str, code: &str| -> Result<(), String> {
                println!("one-time code for {email}: {code}");
                Ok(())
            };
            SqliteIdentityProvider::try_new(&conn, print_code)?
                .with_code_ttl(config.code_ttl)
                .send_one_time_code(&email)?;
        }
        Commands::VerifyCode { email, code } => {
            let conn = open(&config)?;
            let session = SqliteIdentityProvider::try_new(&conn, no_delivery)?
                .verify_one_time_code(&email, &code)?;
            println!("{}", session.token);
        }
        Commands::Show {
            session,
            pair_id,
            part,
        } => {
            let conn = open(&config)?;
            let context = resume(&conn, &config, &session)?;
            let mut controller = RecordController::new(SqliteStore::try_new(&conn)?, context);
            controller.refresh_roster()?;
            controller.select_pair(&pair_id)?;
            controller.select_part(part)?;
            let Some(record) = controller.record() else {
                bail!("no record loaded for {pair_id} {part}");
            };
            eprintln!("access={:?}", controller.access());
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        Commands::Export { session, kind } => {
            let conn = open(&config)?;
            let context = resume(&conn, &config, &session)?;
            let file = ExportService::new(SqliteStore::try_new(&conn)?, context)
                .export_csv(kind.into())?;
            info!(
                "event=cli_export module=cli status=ok rows={}",
                file.row_count
            );
            eprintln!("{} ({} rows)", file.file_name, file.row_count);
            if !file.body.is_empty() {
                println!("{}", file.body);
            }
        }
    }
    Ok(())
}

fn open(config: &PortalConfig) -> Result<Connection> {
    open_db(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))
}

fn resume(conn: &Connection, config: &PortalConfig, token: &str) -> Result<SessionContext> {
    let identity = SqliteIdentityProvider::try_new(conn, no_delivery)?
        .with_session_ttl(config.session_ttl)
        .resume_session(token)
        .context("session is not active; run verify-code again")?;
    Ok(SessionContext::signed_in(identity))
}

fn no_delivery(_email: &str, _code: &str) -> Result<(), String> {
    Err("code delivery is not available here".to_string())
}

fn parse_part(value: &str) -> Result<PartName, String> {
    PartName::parse(value).ok_or_else(|| format!("unknown part `{value}` (Part1..Part4)"))
}
