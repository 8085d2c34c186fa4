use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hyp",
    about = "Hyperspace: run applications straight from replicated drives",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding one sub-directory per drive, named by its key
    #[arg(long, global = true, default_value = ".")]
    pub drives: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show an application's entry point
    Entry(EntryArgs),
    /// Read every module recorded in an application's trace
    Preload(UrlArgs),
    /// Fetch and pin a whole application
    Download(UrlArgs),
    /// Resolve and load a module the way a running application would
    Require(RequireArgs),
    /// Start the Hyperspace protocol server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct EntryArgs {
    /// Application location: a local path or asset://<key>/<path>
    pub url: String,
    /// Fetch the entry file before reporting it
    #[arg(long)]
    pub preload: bool,
}

#[derive(Args)]
pub struct UrlArgs {
    pub url: String,
}

#[derive(Args)]
pub struct RequireArgs {
    /// Module specifier
    pub name: String,
    /// Requiring file
    #[arg(long, default_value = "/index.js")]
    pub from: String,
    /// Drive to resolve on; local disk when omitted
    #[arg(long)]
    pub key: Option<String>,
    /// Print the accumulated trace instead of the module
    #[arg(long)]
    pub trace: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<String>,
    /// Serve key-less module requests from this directory
    #[arg(long)]
    pub local_root: Option<PathBuf>,
}
