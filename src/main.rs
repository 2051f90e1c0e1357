use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use schemahash::cli::{add, check, history, init, migrate, report, show, Context};
use schemahash::config::Config;
use schemahash::StateError;

#[derive(Parser)]
#[command(name = "schemahash")]
#[command(about = "Track schema migrations by the content hash of each table")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "schemahash.yaml")]
    config: String,

    /// Database to track (SQLite file or Postgres database), overrides config
    #[arg(short, long)]
    database: Option<String>,

    /// Directory holding migration state, overrides config
    #[arg(long)]
    state_dir: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the current schema as the first migration
    Init {
        /// Overwrite existing migration state
        #[arg(long)]
        force: bool,
    },

    /// Report whether the database is up to date and what would run next
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a SQL file against the database and record it as a migration
    Add {
        /// SQL file to run
        file: PathBuf,

        /// Description of the change
        #[arg(required = true)]
        comment: Vec<String>,
    },

    /// Run the next migration, or the one named
    Migrate {
        /// Migration slug (defaults to the unambiguous next migration)
        slug: Option<String>,

        /// Keep applying until no next migration is obvious
        #[arg(long, conflicts_with = "slug")]
        all: bool,
    },

    /// List known migrations
    History,

    /// Show a migration's SQL
    Show {
        /// Migration slug (defaults to the most recent)
        slug: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report::error(&format!("{:#}", e));
            if e.downcast_ref::<StateError>().is_some_and(StateError::is_corruption) {
                report::info("The state files are damaged. Restore them from version control.");
            }
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    // Load config
    let config = Config::load(&cli.config)?.with_overrides(cli.database, cli.state_dir);

    let ctx = Context::from_config(&config)?;

    match cli.command {
        Commands::Init { force } => {
            init::run(&ctx, force)?;
        }
        Commands::Check { json } => {
            let resolution = check::run(&ctx, json)?;
            return Ok(check::exit_code(&resolution));
        }
        Commands::Add { file, comment } => {
            add::run(&ctx, &file, &comment.join(" "))?;
        }
        Commands::Migrate { slug, all } => {
            migrate::run(&ctx, slug, all)?;
        }
        Commands::History => {
            history::run(&ctx)?;
        }
        Commands::Show { slug } => {
            show::run(&ctx, slug)?;
        }
    }

    Ok(0)
}
