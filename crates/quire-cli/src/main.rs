//! Quire CLI - a terminal driver for the private journal
//!
//! Writes and lists entries in the local database and reconciles them with a
//! file-backed remote store.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::{Session, SessionPaths};
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::list::{run_list, run_show};
use crate::commands::reports::{run_reports, run_resolve_reports};
use crate::commands::restore::run_restore;
use crate::commands::sync::run_sync;
use crate::commands::write::run_write;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "quire=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = SessionPaths::resolve(cli.db_path, cli.remote_path, cli.settings);
    let session = Session::open(&paths, &cli.user)?;

    // written back even when the command failed
    let result = dispatch(&session, cli.command).await;
    session.close()?;
    result
}

async fn dispatch(session: &Session, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Write { text, date, mood } => {
            run_write(session, &text, date.as_deref(), mood)?;
        }
        Commands::List { limit, json } => run_list(session, limit, json)?,
        Commands::Show { date } => run_show(session, &date)?,
        Commands::Delete { date } => run_delete(session, &date).await?,
        Commands::Sync { timeout } => {
            run_sync(session, timeout).await?;
        }
        Commands::Export { format, output } => {
            run_export(session, format, output.as_deref())?;
        }
        Commands::Restore { path } => run_restore(session, &path)?,
        Commands::Reports {
            journal_id,
            resolve,
            json,
        } => match resolve {
            Some(content_id) => run_resolve_reports(session, &journal_id, &content_id).await?,
            None => run_reports(session, &journal_id, json).await?,
        },
    }
    Ok(())
}
