//! CLI commands and argument parsing

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// connectorkit command-line tool
#[derive(Parser, Debug)]
#[command(name = "connectorkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered providers
    Providers,

    /// List the objects of a provider module
    Objects {
        /// Provider name
        provider: String,

        /// Module id (defaults to the provider's default module)
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Read one page of an object
    Read {
        /// Provider name
        provider: String,

        /// Object name
        object: String,

        /// Credentials file (JSON)
        #[arg(short, long)]
        credentials: PathBuf,

        /// Module id
        #[arg(short, long)]
        module: Option<String>,

        /// Fields to project (comma-separated)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Only records updated at or after this instant (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Only records updated before this instant (RFC 3339)
        #[arg(long)]
        until: Option<DateTime<Utc>>,

        /// Records per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Token returned by a previous page
        #[arg(long)]
        next_page: Option<String>,

        /// Follow next pages until done (or this many pages)
        #[arg(long)]
        pages: Option<usize>,
    },

    /// Describe objects
    Metadata {
        /// Provider name
        provider: String,

        /// Object names
        #[arg(required = true)]
        objects: Vec<String>,

        /// Credentials file (JSON)
        #[arg(short, long)]
        credentials: PathBuf,

        /// Module id
        #[arg(short, long)]
        module: Option<String>,
    },
}
