//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use bulkhead::ops::OutputFormat;

/// Bulkhead - minimal package interfaces with privacy checks
#[derive(Parser)]
#[command(name = "bulkhead")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute, validate and write every package interface
    Generate(GenerateArgs),

    /// Validate interfaces and verify written artifacts are up to date
    Check(CheckArgs),

    /// Show the interface closure of one package
    Closure(ClosureArgs),

    /// List packages with their exports and dependencies
    Packages(PackagesArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where the inputs come from. Overrides `Bulkhead.toml`.
#[derive(Args, Clone, Default)]
pub struct InputArgs {
    /// Symbol table file (.json or .toml)
    #[arg(long, env = "BULKHEAD_SYMBOLS")]
    pub symbols: Option<PathBuf>,

    /// Directory searched for __package.toml manifests
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Output location and format. Overrides `Bulkhead.toml`.
#[derive(Args, Clone, Default)]
pub struct OutputArgs {
    /// Output directory for interface files
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Artifact format (stub, json)
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Skip the test-only tier
    #[arg(long)]
    pub no_test_tier: bool,
}

/// Analysis selection shared by generate and check.
#[derive(Args, Clone, Default)]
pub struct AnalysisArgs {
    /// Only analyze these packages
    #[arg(short, long = "package")]
    pub packages: Vec<String>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Violation kinds that fail the command (repeatable)
    #[arg(long)]
    pub deny: Vec<String>,

    /// Print a JSON report to stdout instead of human output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Only validate; don't compare against written artifacts
    #[arg(long)]
    pub no_artifacts: bool,
}

#[derive(Args)]
pub struct ClosureArgs {
    /// Package name
    pub package: String,

    /// Show the test-only closure
    #[arg(long)]
    pub test: bool,

    /// Explain why a symbol is part of the closure
    #[arg(long, value_name = "SYMBOL")]
    pub explain: Option<String>,

    /// Print the interface stub instead of the member list
    #[arg(long, conflicts_with = "explain")]
    pub stub: bool,

    /// Print JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Args)]
pub struct PackagesArgs {
    /// Print JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Flags that apply to every command.
#[derive(Clone, Copy)]
pub struct GlobalOpts {
    pub verbose: bool,
    pub no_color: bool,
}
