//! CLI binary entry point for tea-ingest

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tea_ingest::cli::commands::db::{DbInitArgs, handle_db_init};
#[cfg(feature = "cli")]
use tea_ingest::cli::commands::ingest::{IngestArgs, handle_ingest};
#[cfg(feature = "cli")]
use tea_ingest::cli::commands::query::{QueryArgs, handle_query};
#[cfg(feature = "cli")]
use tea_ingest::cli::logging::{LogConfig, LogFormat, init_logging};
#[cfg(feature = "cli")]
use tea_ingest::models::TEA_PROFILES_TABLE;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "tea-ingest")]
#[command(about = "Staged CSV ingestion of tea profiles into PostgreSQL or DuckDB")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Database management commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Ingest a CSV file into a table
    Ingest {
        /// CSV file with a header row
        file: PathBuf,
        /// Target table
        #[arg(short, long, default_value = TEA_PROFILES_TABLE)]
        table: String,
        /// Directory holding .tea-ingest.toml (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Rows per INSERT into the staging table
        #[arg(long)]
        batch_size: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Skip the ingest when the table already has rows
        #[arg(long)]
        seed_if_empty: bool,
    },

    /// Execute SQL queries against the configured database
    Query {
        /// SQL query to execute
        sql: String,
        /// Directory holding .tea-ingest.toml (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum DbCommands {
    /// Write .tea-ingest.toml if missing and create the target table
    Init {
        /// Directory for .tea-ingest.toml
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Database backend (duckdb, postgres)
        #[arg(short, long, default_value = "duckdb")]
        backend: String,
        /// PostgreSQL connection string (required for postgres backend)
        #[arg(long)]
        connection_string: Option<String>,
        /// Table to create
        #[arg(short, long, default_value = TEA_PROFILES_TABLE)]
        table: String,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_verbosity(cli.verbose);
    if cli.log_json {
        log_config = log_config.with_format(LogFormat::Json);
    }
    init_logging(&log_config);

    let result = match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Init {
                dir,
                backend,
                connection_string,
                table,
            } => {
                let args = DbInitArgs {
                    dir,
                    backend,
                    connection_string,
                    table,
                };
                handle_db_init(&args)
            }
        },

        Commands::Ingest {
            file,
            table,
            dir,
            batch_size,
            json,
            seed_if_empty,
        } => {
            let args = IngestArgs {
                file,
                dir,
                table,
                batch_size,
                json,
                seed_if_empty,
            };
            handle_ingest(&args)
        }

        Commands::Query { sql, dir, format } => {
            let args = QueryArgs { sql, dir, format };
            handle_query(&args)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
