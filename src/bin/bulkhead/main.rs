//! Bulkhead CLI - minimal package interfaces with privacy checks

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use bulkhead::core::ManifestError;
use bulkhead::util::diagnostic::emit;
use cli::{Cli, Commands, GlobalOpts};

fn main() {
    if let Err(e) = run() {
        // Manifest problems carry their own suggestions.
        match e.chain().find_map(|c| c.downcast_ref::<ManifestError>()) {
            Some(manifest_error) => emit(&manifest_error.to_diagnostic(), std::io::stderr().is_terminal()),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("bulkhead=debug")
    } else {
        EnvFilter::new("bulkhead=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = GlobalOpts {
        verbose: cli.verbose,
        no_color: cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, global),
        Commands::Check(args) => commands::check::execute(args, global),
        Commands::Closure(args) => commands::closure::execute(args, global),
        Commands::Packages(args) => commands::packages::execute(args, global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
