//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tm_core::{Dialect, Version};

/// tidemark - versioned, idempotent schema migrations for SQLite and PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Named target from tidemark.yml
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Override the SQL dialect (sqlite, postgres)
    #[arg(long, global = true)]
    pub dialect: Option<Dialect>,

    /// Override the SQLite database file
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Migrate(MigrateArgs),

    /// Show applied and pending migrations
    Status(StatusArgs),

    /// Print the SQL pending migrations would run
    Plan(PlanArgs),

    /// Remove ledger records so migrations run again
    Reset(ResetArgs),
}

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the status report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Render every migration, not only pending ones
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the reset command
#[derive(Args, Debug)]
#[command(group(
    clap::ArgGroup::new("scope")
        .required(true)
        .args(["from", "all"]),
))]
pub struct ResetArgs {
    /// Forget this version and every later one
    #[arg(long, value_name = "VERSION")]
    pub from: Option<Version>,

    /// Forget every applied version
    #[arg(long)]
    pub all: bool,

    /// Confirm the reset
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
