//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Render QWeb template bundles against a JSON context.
#[derive(Parser, Debug, Clone)]
#[command(name = "qweb-rs")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Template bundle file (XML with t-name entries)
    pub bundle: PathBuf,

    /// Template to render
    #[arg(short, long)]
    pub template: Option<String>,

    /// JSON file providing the evaluation context
    #[arg(short, long)]
    pub context: Option<PathBuf>,

    /// List the registered templates instead of rendering
    #[arg(long)]
    pub list: bool,

    /// Output format
    #[arg(long, default_value = "html")]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format for rendered templates.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// The rendered HTML
    #[default]
    Html,
    /// JSON with the template name and rendered HTML
    Json,
}
