//! cassref CLI - check and repair back references in a wide-column object store

mod commands;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use cassref::checker::CheckScope;
use cassref::config::{self, ConnectionConfig, ConnectionOverrides};
use cassref::index::MatchMode;
use cassref::output::OutputMode;
use cassref::store::{CassandraStore, SqliteStore, Store};
use commands::RunOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cassref")]
#[command(version)]
#[command(about = "Check and repair back references between obj_uuid_table and obj_fq_name_table")]
#[command(long_about = r#"
cassref scans the object tables of a config keyspace for stale
`backref:<type>:<uuid>` columns and removes them once the referenced
object is confirmed gone.

Example usage:
  cassref info 3f2a9d1c-...
  cassref check-backref all
  cassref --dry-run clear-backref 3f2a9d1c-...
  cassref --snapshot copy.db check-backref all
"#)]
struct Cli {
    /// Server IP address
    #[arg(long, global = true)]
    server: Option<String>,

    /// Native protocol port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Keyspace holding the object tables
    #[arg(long, global = true)]
    keyspace: Option<String>,

    /// Config file (defaults to ./cassref.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read and repair a SQLite snapshot instead of a live cluster
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputMode::Text, global = true)]
    format: OutputMode,

    /// Match ids as whole ':'-separated segments instead of substrings
    #[arg(long, global = true)]
    exact: bool,

    /// Report what repairs would delete without deleting
    #[arg(long, global = true)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the type, fq_name and parent_type of an object
    Info {
        /// Object UUID
        id: String,
    },

    /// Print every cell of both tables containing a string
    Fulltext {
        /// String to look for in keys, column names and values
        needle: String,
    },

    /// Check back reference consistency for one id or all ids
    CheckBackref {
        /// Object UUID, or `all`
        target: CheckScope,
    },

    /// Delete stale back references to an object that no longer exists
    ClearBackref {
        /// Object UUID, or `all` for every entirely absent target
        target: CheckScope,
    },

    /// Delete the leftover columns of an object that no longer exists
    ClearProps {
        /// Object UUID
        id: String,
    },

    /// Copy both tables into a SQLite snapshot file
    Snapshot {
        /// Destination file
        path: PathBuf,
    },
}

/// The store a command runs against; released exactly once
enum Backend {
    Live(CassandraStore),
    Snapshot(SqliteStore),
}

impl Backend {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        if let Some(path) = &cli.snapshot {
            if !path.exists() {
                anyhow::bail!("snapshot not found: {}", path.display());
            }
            tracing::info!("Using snapshot {}", path.display());
            return Ok(Backend::Snapshot(SqliteStore::open(path)?));
        }

        let file = config::load_config(cli.config.as_deref())?;
        let overrides = ConnectionOverrides {
            server: cli.server.clone(),
            port: cli.port,
            keyspace: cli.keyspace.clone(),
        };
        let connection = ConnectionConfig::resolve(file.as_ref(), overrides);
        Ok(Backend::Live(CassandraStore::connect(&connection)?))
    }

}

/// An opened store that has to be released after the command
trait OpenStore {
    fn store(&self) -> &dyn Store;
    fn close(self);
}

impl OpenStore for Backend {
    fn store(&self) -> &dyn Store {
        match self {
            Backend::Live(store) => store,
            Backend::Snapshot(store) => store,
        }
    }

    fn close(self) {
        match self {
            Backend::Live(store) => store.close(),
            Backend::Snapshot(store) => drop(store),
        }
    }
}

/// Parse failures that should just show usage and exit cleanly
fn shows_usage(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            | ErrorKind::MissingRequiredArgument
            | ErrorKind::MissingSubcommand
    )
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            e.print()?;
            return Ok(());
        }
        Err(e) if shows_usage(&e) => {
            Cli::command().print_long_help()?;
            return Ok(());
        }
        Err(e) => e.exit(),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info,scylla=warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let opts = RunOptions {
        output_mode: cli.format,
        match_mode: if cli.exact { MatchMode::Segment } else { MatchMode::Substring },
        dry_run: cli.dry_run,
    };

    let backend = Backend::open(&cli)?;
    execute(&cli.command, backend, opts)
}

/// Run `command` and release `backend` whether it succeeded or not
fn execute(command: &Commands, backend: impl OpenStore, opts: RunOptions) -> anyhow::Result<()> {
    let result = run(command, backend.store(), opts);
    if let Err(e) = &result {
        tracing::debug!("Command failed, closing store: {}", e);
    }
    backend.close();
    result
}

fn run(command: &Commands, store: &dyn Store, opts: RunOptions) -> anyhow::Result<()> {
    match command {
        Commands::Info { id } => commands::run_info(store, id, opts),
        Commands::Fulltext { needle } => commands::run_fulltext(store, needle, opts),
        Commands::CheckBackref { target } => commands::run_check(store, target.clone(), opts),
        Commands::ClearBackref { target } => commands::run_clear_backref(store, target.clone(), opts),
        Commands::ClearProps { id } => commands::run_clear_props(store, id, opts),
        Commands::Snapshot { path } => commands::run_snapshot(store, path, opts),
    }
}
