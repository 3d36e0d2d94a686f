//! Interactive ledger shell.
//!
//! # Responsibility
//! - Load the ledger from a SQLite file and drive it from stdin.
//! - Persist every change in the background and flush before exit.
//!
//! Usage: `lazyledger_cli [db-path]`. `LAZYLEDGER_CONFIG` may point at a JSON
//! config file.

mod shell;

use lazyledger_core::{
    default_log_level, init_logging, BackgroundPersister, ExpenseStore, LedgerConfig,
    LedgerService, LogOptions, RandomIds, SqliteExpenseStore, SystemClock,
};
use log::{info, warn};
use shell::Outcome;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DEFAULT_DB_FILE: &str = "lazyledger.db";
const CONFIG_ENV: &str = "LAZYLEDGER_CONFIG";

fn main() -> ExitCode {
    let db_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_DB_FILE), PathBuf::from);

    match run(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: &Path) -> Result<(), Box<dyn Error>> {
    let db_path = std::env::current_dir()?.join(db_path);
    start_logging(&db_path);

    let config = load_config()?;
    let entities = SqliteExpenseStore::open(&db_path)?.load()?;
    let persister = BackgroundPersister::spawn(SqliteExpenseStore::open(&db_path)?)?;
    let mut ledger = LedgerService::new(
        config,
        Box::new(SystemClock),
        Box::new(RandomIds),
        persister,
    )?
    .with_entities(entities);
    info!(
        "event=cli_start module=cli status=ok entities={}",
        ledger.len()
    );

    println!(
        "lazyledger {} ({} entries) - type `help`",
        lazyledger_core::core_version(),
        ledger.len()
    );
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        match shell::execute(&mut ledger, &line, &mut stdout) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Quit) => break,
            Err(err) => eprintln!("error: {err}"),
        }
        stdout.flush()?;
    }

    if !ledger.persister().flush() {
        warn!("event=cli_exit module=cli status=error error_code=persist_worker_gone");
    }
    let status = ledger.persister().status();
    if let Some(error) = status.last_error {
        eprintln!("warning: last save failed: {error}");
    }
    info!(
        "event=cli_exit module=cli status=ok revision={} failed_saves={}",
        ledger.revision(),
        status.failed_saves
    );
    Ok(())
}

fn start_logging(db_path: &Path) {
    let log_dir = db_path
        .parent()
        .map_or_else(|| PathBuf::from("logs"), |dir| dir.join("logs"));
    let options = LogOptions {
        level: default_log_level().to_string(),
        log_dir,
        echo_warnings: true,
    };
    if let Err(err) = init_logging(&options) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn load_config() -> Result<LedgerConfig, Box<dyn Error>> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Ok(LedgerConfig::from_json_str(&raw)?)
        }
        None => Ok(LedgerConfig::default()),
    }
}
