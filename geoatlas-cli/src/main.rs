//! GeoAtlas CLI: research-paper search, country data and map layers for the
//! Human Geography Map, plus the HTTP gateway the map UI talks to.

mod commands;
mod gateway;

use clap::Parser;
use geoatlas_core::{AcademicLevel, MethodologyCategory, SortBy};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// GeoAtlas: backend for the Human Geography Map
#[derive(Parser, Debug)]
#[command(name = "geoatlas", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.geoatlas/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (replaces the user and workspace files)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Search research papers
    Search(SearchArgs),
    /// List countries, optionally for one region
    Countries {
        /// Region such as `europe` or `asia`
        #[arg(short, long)]
        region: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one country by ISO code
    Country {
        /// Alpha-2 or alpha-3 code, e.g. `KE` or `KEN`
        code: String,
        #[arg(long)]
        json: bool,
    },
    /// Latest World Bank education indicators for a country
    Education {
        code: String,
        #[arg(long)]
        json: bool,
    },
    /// Recent geography news
    News {
        /// Search terms (defaults to "human geography")
        query: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Summarize a Natural Earth map layer
    Layer {
        /// countries, rivers, lakes, coastline or populated-places
        name: String,
    },
    /// Start the HTTP gateway
    Serve {
        /// Address to bind (overrides `server.host`)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides `server.port`)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct SearchArgs {
    /// Search terms
    #[arg(required = true)]
    query: Vec<String>,
    /// Earliest publication year
    #[arg(long)]
    from_year: Option<i32>,
    /// Latest publication year
    #[arg(long)]
    to_year: Option<i32>,
    /// Academic level (repeatable): undergraduate, graduate, advanced
    #[arg(long = "level")]
    levels: Vec<AcademicLevel>,
    /// Only open-access papers
    #[arg(long)]
    open_access: bool,
    #[arg(long)]
    min_citations: Option<u64>,
    #[arg(long)]
    max_citations: Option<u64>,
    /// Methodology family (repeatable): quantitative, qualitative, mixed, theoretical
    #[arg(long = "methodology")]
    methodologies: Vec<MethodologyCategory>,
    /// Subfield tag to match (repeatable)
    #[arg(long = "subfield")]
    subfields: Vec<String>,
    /// Extra topic appended to the query (repeatable)
    #[arg(long = "topic")]
    topics: Vec<String>,
    /// Do not bias toward geography or filter for geography relevance
    #[arg(long)]
    no_geography_focus: bool,
    /// relevance, citations, newest or freshness
    #[arg(long, default_value = "relevance")]
    sort: SortBy,
    /// Number of results to print
    #[arg(short = 'n', long, default_value = "10")]
    limit: usize,
    #[arg(long)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default `.geoatlas/config.toml` into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn,geoatlas=info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("org", "geoatlas", "geoatlas")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "geoatlas.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}
