//! CLI command structure using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pageweave")]
#[command(version, about = "Compose server-rendered views from directive templates", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory (defaults to the nearest directory with pageweave.toml)
    #[arg(long, global = true, env = "PAGEWEAVE_ROOT")]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a page to stdout or a file
    Render {
        /// Page identifier (e.g., "home" or "components.header")
        page: String,

        /// Context data (.json or .toml)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write the page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show which file an identifier resolves to
    Resolve {
        /// Template identifier
        identifier: String,
    },

    /// Parse every template and report errors
    Check {
        #[arg(long)]
        json: bool,
    },

    /// Watch templates and serve live reload events until Ctrl-C
    Dev,
}
