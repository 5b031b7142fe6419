//! # Copycat CLI (`copycat`)
//!
//! The `copycat` binary hosts the duplicate-submission engine over a local
//! SQLite database. It stands in for the upload-handling application: it
//! reads a file, evaluates it, and records the verdict.
//!
//! ## Usage
//!
//! ```bash
//! copycat --config ./config/copycat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `copycat init` | Create the SQLite database and run schema migrations |
//! | `copycat submit <FILE> --author A --scope S` | Evaluate and record a submission |
//! | `copycat rebuild <SCOPE>` | Refit a scope's model and index eagerly |
//! | `copycat compare <A> <B> --scope S` | Similarity of two files under a scope's model |
//! | `copycat stats [--scope S]` | Accepted/rejected counts per scope |
//! | `copycat get <ID>` | Show a stored submission and its verdict |
//!
//! ## Examples
//!
//! ```bash
//! copycat init
//! copycat submit essay.pdf --author alice --scope cs101-hw3
//! copycat submit scan.jpg --author bob --scope cs101-hw3
//! copycat stats --scope cs101-hw3
//! ```

mod compare;
mod config;
mod db;
mod get;
mod logging;
mod migrate;
mod ocr;
mod pipeline;
mod rebuild;
mod sqlite_repo;
mod stats;
mod submit;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Copycat CLI — duplicate and near-duplicate submission detection.
#[derive(Parser)]
#[command(
    name = "copycat",
    about = "Copycat — duplicate and near-duplicate submission detection",
    version,
    long_about = "Copycat fingerprints each submission, extracts its text (plain text, PDF, \
    or OCR of scanned images), and compares it against earlier submissions in the same scope \
    with a TF-IDF similarity index. Every submission gets an accepted or rejected verdict with \
    a human-readable reason."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/copycat.toml`. Only `[db].path` is required.
    #[arg(long, global = true, default_value = "./config/copycat.toml")]
    config: PathBuf,

    /// Log pipeline steps at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `submissions` table.
    /// Running it more than once is safe.
    Init,

    /// Evaluate a file and record its verdict.
    ///
    /// Exits 0 whenever a verdict is produced, accepted or rejected.
    Submit {
        /// File to submit.
        file: PathBuf,

        /// Submitting author's identifier.
        #[arg(long)]
        author: String,

        /// Comparison pool, e.g. an assignment ID.
        #[arg(long)]
        scope: String,

        /// Declared format (`txt`, `pdf`, `png`, `jpg`, or a MIME type).
        /// Inferred from the file extension when omitted.
        #[arg(long)]
        format: Option<String>,

        /// Print the verdict as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Refit a scope's vector model and similarity index.
    Rebuild {
        /// Scope to rebuild.
        scope: String,
    },

    /// Print the similarity of two files under a scope's current model.
    Compare {
        a: PathBuf,
        b: PathBuf,

        /// Scope whose model is used.
        #[arg(long)]
        scope: String,
    },

    /// Show accepted and rejected counts per scope.
    Stats {
        /// Only report this scope.
        #[arg(long)]
        scope: Option<String>,
    },

    /// Show a stored submission by its UUID.
    Get {
        /// Submission UUID.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_cli_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Submit {
            file,
            author,
            scope,
            format,
            json,
        } => {
            submit::run_submit(&cfg, &file, &author, &scope, format.as_deref(), json).await?;
        }
        Commands::Rebuild { scope } => {
            rebuild::run_rebuild(&cfg, &scope).await?;
        }
        Commands::Compare { a, b, scope } => {
            compare::run_compare(&cfg, &a, &b, &scope).await?;
        }
        Commands::Stats { scope } => {
            stats::run_stats(&cfg, scope.as_deref()).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
    }

    Ok(())
}
