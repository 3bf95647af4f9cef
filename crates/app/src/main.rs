//! learn - course progress and lesson unlocking from the terminal.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use learn_core::Clock;
use services::{AppServices, ProgressConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod demo;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<String> {
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;

    let config = ProgressConfig::from_env();
    let services = AppServices::new_sqlite(&db_url, Clock::default(), cli.user_id, config)
        .await
        .with_context(|| format!("opening {db_url}"))?;
    tracing::debug!(db_url = %db_url, user_id = %cli.user_id, "services ready");

    match &cli.command {
        Commands::Seed => commands::seed(&services).await,
        Commands::Courses => commands::courses(&services).await,
        Commands::Show(args) => commands::show(&services, args.course).await,
        Commands::Complete(args) => commands::complete(&services, args.lesson).await,
        Commands::Progress(args) => commands::advance(&services, args.lesson, args.percent).await,
        Commands::Next(args) => commands::next(&services, args.lesson).await,
        Commands::Resume => commands::resume(&services).await,
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,services=info,app=info",
        1 => "info,services=debug,storage=debug,app=debug",
        _ => "debug,sqlx=info",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// sqlx does not create missing database files; touch the file and its
/// parent directories first.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid database url: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}
