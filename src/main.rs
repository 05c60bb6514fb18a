mod cli;
mod config;
mod providers;
mod registry;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{
    list::list_cmd,
    query::{match_cmd, resolve_cmd, select_cmd},
    ColorMode,
};
use registry::Category;
use tracing_subscriber::EnvFilter;

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "crossroute")]
#[command(
    about = "Find, resolve and select inference models across providers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read the configuration from this file instead of the default locations
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models or providers
    List(ListArgs),
    /// Resolve a model name, with optional features, to a single model
    Resolve(ResolveArgs),
    /// List the models matching a name pattern
    Match(MatchArgs),
    /// Pick the cheapest online chat model meeting a set of requirements
    Select(SelectArgs),
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Registered models and their status
    Models(ListModelArgs),
    /// Model counts per provider and status
    Providers(ListProviderArgs),
}

/// Output formats
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

#[derive(Parser, Default)]
pub(crate) struct ListModelArgs {
    /// Limit listing to the specified category
    #[arg(short, long)]
    category: Option<Category>,
    /// Limit listing to the specified provider
    #[arg(short, long)]
    provider: Option<String>,
}

#[derive(Parser, Default)]
pub(crate) struct ListProviderArgs {
    /// Limit listing to the specified category
    #[arg(short, long)]
    category: Option<Category>,
}

#[derive(Parser)]
pub(crate) struct ResolveArgs {
    /// A model name such as `openai:gpt-4.1?temperature=0.2`
    name: String,
    /// The category to resolve the name in
    #[arg(short, long, default_value_t = Category::Chat)]
    category: Category,
    /// A JSON request body to run through the model's request hook
    #[arg(short, long)]
    request: Option<String>,
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Parser)]
pub(crate) struct MatchArgs {
    /// A name pattern such as `ollama:llama*?num_ctx`
    name_like: String,
    /// The category to search
    #[arg(short, long, default_value_t = Category::Chat)]
    category: Category,
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Parser)]
pub(crate) struct SelectArgs {
    /// Requirements such as `openai:intelligence>=3,context_length>=64000`,
    /// or a registered model key
    requirements: String,
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing();

    let color = ColorMode::resolve_auto(cli.color);

    utils::errors::configure_color(color);

    let config = config::read_config(cli.config);

    match &cli.command {
        Commands::List(args) => list_cmd(&config, args).await,
        Commands::Resolve(args) => resolve_cmd(&config, args).await,
        Commands::Match(args) => match_cmd(&config, args).await,
        Commands::Select(args) => select_cmd(&config, args).await,
    }
}
