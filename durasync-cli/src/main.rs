//! durasync - operator CLI
//!
//! Reads and repairs save records on disk and inspects the persisted
//! cloud function queue without starting the services.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    durasync_core::logger::init_tracing(&cli.log_level);

    let ctx = Context::from_cli(&cli)?;
    match cli.command {
        Commands::Get { slot, key } => commands::handle_get(&ctx, &slot, &key).await,
        Commands::Put { slot, key, json } => commands::handle_put(&ctx, &slot, &key, &json).await,
        Commands::Delete { slot, key } => commands::handle_delete(&ctx, &slot, &key).await,
        Commands::Exists { slot, key } => commands::handle_exists(&ctx, &slot, &key).await,
        Commands::Backups { slot, key } => commands::handle_backups(&ctx, &slot, &key).await,
        Commands::Queue(cmd) => commands::handle_queue_command(&ctx, cmd).await,
        Commands::Config(cmd) => commands::handle_config_command(&ctx, cmd),
    }
}
