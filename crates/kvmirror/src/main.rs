// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! kvmirror - a persistent key/value mirror over SQLite.
//!
//! This is the binary entry point for the kvmirror CLI.

mod commands;
mod status;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;

use kvmirror_config::model::MirrorConfig;
use kvmirror_config::{ConfigError, render_errors};
use kvmirror_sync::{InitOptions, JsonFileSource, MirrorEngine, flush_on_shutdown};

/// kvmirror - a persistent key/value mirror over SQLite.
#[derive(Parser, Debug)]
#[command(name = "kvmirror", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `storage.table`.
    #[arg(long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the JSON value stored under a key.
    Get { key: String },
    /// Store a JSON value under a key.
    Set { key: String, value: String },
    /// Delete a key.
    Remove { key: String },
    /// Print every key and its JSON value.
    List,
    /// Delete every key.
    Clear,
    /// Import entries from a legacy JSON file.
    Import {
        /// Legacy file; defaults to `legacy.source_path`.
        #[arg(long)]
        source: Option<PathBuf>,
        /// Only import keys with this prefix; defaults to `legacy.local_storage_prefix`.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Show backend, table, and entry count.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<MirrorConfig, Vec<ConfigError>> {
    let mut config = match &cli.config {
        Some(path) => kvmirror_config::load_and_validate_path(path)?,
        None => kvmirror_config::load_and_validate()?,
    };
    if let Some(table) = &cli.table {
        config.storage.table = table.clone();
        kvmirror_config::validation::validate_config(&config)?;
    }
    Ok(config)
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kvmirror={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Init options for the command; `import` overrides the legacy settings.
fn init_options(
    cli: &Cli,
    config: &MirrorConfig,
) -> Result<InitOptions, kvmirror_core::MirrorError> {
    match &cli.command {
        Commands::Import { source, prefix } => {
            let path = match source {
                Some(path) => path.clone(),
                None => config
                    .legacy
                    .source_path
                    .as_deref()
                    .map(PathBuf::from)
                    .ok_or_else(|| {
                        kvmirror_core::MirrorError::Config(
                            "no legacy source: pass --source or set legacy.source_path"
                                .to_string(),
                        )
                    })?,
            };
            let prefix = prefix
                .clone()
                .unwrap_or_else(|| config.legacy.local_storage_prefix.clone());
            Ok(InitOptions::new(config.storage.store_options())
                .with_legacy_source(JsonFileSource::open(path)?, prefix))
        }
        _ => InitOptions::from_config(config),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(errors) => {
            render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);
    debug!(table = %config.storage.table, path = %config.storage.database_path, "config loaded");

    let engine = MirrorEngine::with_settings(
        kvmirror_storage::default_store(),
        std::sync::Arc::new(kvmirror_core::JsonCodec),
        config.sync.debounce(),
    );

    let options = match init_options(&cli, &config) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("kvmirror: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = engine.init(options).await {
        eprintln!("kvmirror: cannot open {}: {e}", config.storage.database_path);
        return ExitCode::FAILURE;
    }

    let token = kvmirror_sync::install_signal_handler();
    let teardown = flush_on_shutdown(engine.clone(), token.clone());

    let mut stdout = std::io::stdout().lock();
    let outcome = match &cli.command {
        Commands::Get { key } => commands::get(&engine, key, &mut stdout),
        Commands::Set { key, value } => commands::set(&engine, key, value),
        Commands::Remove { key } => commands::remove(&engine, key),
        Commands::List => commands::list(&engine, &mut stdout),
        Commands::Clear => commands::clear(&engine),
        Commands::Import { .. } => commands::import(&engine, &mut stdout),
        Commands::Status { json } => {
            status::run_status(&engine, &config, *json, &mut stdout).await
        }
    };
    drop(stdout);

    token.cancel();
    let flushed = match teardown.await {
        Ok(result) => result,
        Err(e) => Err(kvmirror_core::MirrorError::Internal(format!(
            "teardown task failed: {e}"
        ))),
    };

    match (outcome, flushed) {
        (Ok(true), Ok(())) => ExitCode::SUCCESS,
        (Ok(false), Ok(())) => ExitCode::from(1),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("kvmirror: {e}");
            ExitCode::FAILURE
        }
    }
}
