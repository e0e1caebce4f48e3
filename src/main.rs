//! # Findings Desk CLI (`fdesk`)
//!
//! Operator interface for the findings browser backend: seed the issue
//! store, inspect the flattened issue list, remove issues, and start the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! fdesk --config ./config/fdesk.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fdesk init` | Create the issue store, seeding it when empty |
//! | `fdesk list` | Print the flattened issue list with severity buckets |
//! | `fdesk rm <id>` | Delete the issue titled `<id>` |
//! | `fdesk serve` | Start the JSON HTTP server |

mod assistant;
mod config;
mod flatten;
mod models;
mod mutate;
mod scrape;
mod server;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::flatten::flatten;
use crate::models::Severity;
use crate::store::DocumentStore;

/// Findings Desk: a security-findings browser backend with a
/// remediation assistant.
#[derive(Parser)]
#[command(
    name = "fdesk",
    about = "Findings Desk — a security-findings browser backend with a remediation assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the issue store, seeding it from the bundled (or configured)
    /// seed document when empty. Idempotent: an already-populated store
    /// is left untouched.
    Init,

    /// Print the flattened issue list.
    ///
    /// One line per issue: severity bucket, canonical category, title.
    List,

    /// Delete the issue with the given title.
    ///
    /// Sub-sections and sections left empty by the removal are pruned
    /// from the document.
    Rm {
        /// The issue title (`sem_header`).
        id: String,
    },

    /// Start the JSON HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = DocumentStore::open(&config.store)?;
            let doc = store.load()?;
            let count = doc.templates().count();
            println!(
                "Issue store initialized at {} ({} issues)",
                config.store.path.display(),
                count
            );
        }
        Commands::List => {
            let store = DocumentStore::open(&config.store)?;
            let doc = store.load()?;
            let issues = flatten(&doc);
            for issue in &issues {
                let bucket = issue
                    .severity_score
                    .map(|s| Severity::from_score(s).label())
                    .unwrap_or("-");
                println!("[{:9}] {:22} {}", bucket, issue.category, issue.name);
            }
            println!("{} issues", issues.len());
        }
        Commands::Rm { id } => {
            let store = DocumentStore::open(&config.store)?;
            match store.mutate(|doc| mutate::delete(doc, &id))? {
                Ok(deleted) => println!("Deleted \"{}\"", deleted),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
    }

    Ok(())
}
