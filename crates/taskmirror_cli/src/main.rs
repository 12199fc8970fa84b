//! taskmirror CLI
//!
//! Command-line tools for mirroring a remote scope into a local cache.
//!
//! # Commands
//!
//! - `refresh` - Run one refresh against a remote export
//! - `parents` - List locally known parents and their watermarks
//! - `inspect` - Display cache statistics
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// taskmirror command-line cache tools.
#[derive(Parser)]
#[command(name = "taskmirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the cache directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one refresh against a remote export
    Refresh {
        /// JSON export of the remote scope
        #[arg(long)]
        fixture: PathBuf,

        /// Remote scope id
        #[arg(long)]
        scope: u64,

        /// Items requested per page
        #[arg(long)]
        page_size: Option<u32>,

        /// Comma-separated item fields to request
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,

        /// Deadline for a single page, in seconds
        #[arg(long)]
        page_timeout: Option<u64>,
    },

    /// List locally known parents
    Parents {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display cache statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Refresh {
            fixture,
            scope,
            page_size,
            fields,
            page_timeout,
        } => {
            let path = cli.path.ok_or("Cache path required for refresh")?;
            let options = commands::refresh::RefreshOptions {
                fixture,
                scope,
                page_size,
                fields,
                page_timeout,
                verbose: cli.verbose,
            };
            commands::refresh::run(&path, options).await?;
        }
        Commands::Parents { format } => {
            let path = cli.path.ok_or("Cache path required for parents")?;
            commands::parents::run(&path, &format).await?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Cache path required for inspect")?;
            commands::inspect::run(&path, &format).await?;
        }
        Commands::Version => {
            println!("taskmirror CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
