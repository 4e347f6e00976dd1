//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// keel - package vendored SDKs and toolchains for firmware builds
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to Keel.toml (defaults to searching upward from the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    /// Artifact cache directory
    #[arg(long, global = true, env = "KEEL_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the workspace and print the build order
    Plan(PlanArgs),

    /// Acquire artifacts, package every recipe and compose the build environment
    Build(BuildArgs),

    /// Print the composed build environment
    Env(EnvArgs),

    /// Display the dependency tree
    Tree(TreeArgs),

    /// Download remote artifacts into the cache
    Fetch(FetchArgs),

    /// Manage the artifact cache
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct PlanArgs {
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Never touch the network; remote artifacts must already be cached
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args)]
pub struct EnvArgs {
    /// Output format: json, shell or cmake
    #[arg(short, long, default_value = "json")]
    pub format: String,

    /// Recipe whose environment to print (defaults to the workspace consumer)
    #[arg(short, long)]
    pub recipe: Option<String>,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Recipe to show the tree for (defaults to the consumer, or every leaf)
    pub recipe: Option<String>,

    /// Maximum depth to display
    #[arg(short, long)]
    pub depth: Option<usize>,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Recipes to fetch (defaults to every recipe with a remote artifact)
    pub names: Vec<String>,

    /// Fail instead of downloading
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the cache directory
    Path,

    /// List cached artifacts
    List,

    /// Remove every cached artifact
    Clean,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
