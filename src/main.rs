mod commands;
mod config;
mod gcal;
mod openproject;
mod sheets;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskmirror")]
#[command(about = "Mirror OpenProject work packages as time-boxed Google Calendar events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Google and store OAuth tokens
    Auth,
    /// List OpenProject projects and their ids
    Projects,
    /// Show what a sync would do, without touching the calendar
    Status,
    /// Synchronize work packages to the calendar
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Auth => commands::auth::run().await,
        Commands::Projects => commands::projects::run().await,
        Commands::Status => commands::status::run().await,
        Commands::Sync => commands::sync::run().await,
    }
}
