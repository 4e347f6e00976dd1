//! keel CLI - a package orchestrator for embedded firmware

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use keel::util::diagnostic::emit;

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;
    if let Err(e) = run(cli) {
        match e.downcast_ref::<keel::Error>() {
            Some(err) => emit(&err.to_diagnostic(), color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging; RUST_LOG wins when set
    let default_filter = if cli.verbose { "keel=debug" } else { "keel=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = commands::Global::from_cli(&cli)?;

    match cli.command {
        Commands::Plan(args) => commands::plan::execute(args, global),
        Commands::Build(args) => commands::build::execute(args, global),
        Commands::Env(args) => commands::env::execute(args, global),
        Commands::Tree(args) => commands::tree::execute(args, global),
        Commands::Fetch(args) => commands::fetch::execute(args, global),
        Commands::Cache(args) => commands::cache::execute(args, global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
