//! Local harness for the roster core.
//!
//! # Responsibility
//! - Load a JSON sheet bundle from disk and reload it into a service backed by
//!   a SQLite file (warm start) or an in-memory database.
//! - Print query results as pretty JSON.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use unitsearch_core::{
    default_log_level, init_logging, open_db, open_db_in_memory, MemberFilter, RosterConfig,
    RosterService, SearchQuery, SheetBundle, SqliteRosterRepository,
};

/// Roster search and similarity over sheet bundles.
#[derive(Parser)]
#[command(name = "unitsearch", version)]
struct Cli {
    /// SQLite file holding the committed roster; in-memory when omitted.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON sheet bundle to reload before running the command.
    #[arg(long, global = true)]
    bundle: Option<PathBuf>,

    /// Absolute directory for rotating log files; logging is off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reload `--bundle` and print the outcome.
    Reload,
    /// Print the committed generation and entity counts.
    Status,
    /// Search members by name or keyword.
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        branch: Vec<String>,
        #[arg(long)]
        status: Vec<String>,
        #[arg(long)]
        generation: Vec<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Search units by name or alias.
    Units {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show one unit with its ordered members.
    Unit { unit_id: String },
    /// Show one member.
    Member { member_id: String },
    /// Rank members sharing units with `member_id`.
    Similar {
        member_id: String,
        #[arg(long)]
        top: Option<u32>,
    },
    /// List distinct branch, status and generation values.
    Facets,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        init_logging(default_log_level(), log_dir).map_err(|err| anyhow!("{err}"))?;
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RosterConfig::default(),
    };
    let conn = match &cli.db {
        Some(path) => open_db(path).with_context(|| format!("opening {}", path.display()))?,
        None => open_db_in_memory()?,
    };
    let service = RosterService::open(SqliteRosterRepository::try_new(conn)?, config)?;

    if let Some(path) = &cli.bundle {
        let bundle = load_bundle(path)?;
        let outcome = service.reload(&bundle)?;
        info!(
            "event=cli_reload module=cli status=ok generation={} changed={}",
            outcome.generation, outcome.changed
        );
        if matches!(cli.command, Commands::Reload) {
            return print_json(&outcome);
        }
    } else if matches!(cli.command, Commands::Reload) {
        bail!("reload requires --bundle");
    }

    match cli.command {
        Commands::Reload => Ok(()),
        Commands::Status => print_json(&service.status()),
        Commands::Search {
            query,
            branch,
            status,
            generation,
            limit,
            offset,
        } => {
            let mut request = SearchQuery::new(query).with_filter(MemberFilter {
                branch,
                status,
                generation,
            });
            request.limit = limit;
            request.offset = offset;
            print_json(&service.search(&request)?)
        }
        Commands::Units {
            query,
            limit,
            offset,
        } => print_json(&service.search_units(&query, limit, offset)?),
        Commands::Unit { unit_id } => print_json(&service.get_unit(&unit_id)?),
        Commands::Member { member_id } => print_json(&service.get_member(&member_id)?),
        Commands::Similar { member_id, top } => {
            print_json(&service.similarity(&member_id, top)?)
        }
        Commands::Facets => print_json(&service.facets()?),
    }
}

fn load_config(path: &Path) -> anyhow::Result<RosterConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(RosterConfig::from_json_str(&text)?)
}

fn load_bundle(path: &Path) -> anyhow::Result<SheetBundle> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading bundle {}", path.display()))?;
    SheetBundle::from_json_str(&text).with_context(|| format!("parsing bundle {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
