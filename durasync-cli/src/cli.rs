use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "durasync",
    about = "Inspect and repair durasync save records and the persisted call queue",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, env = "DURASYNC_ROOT", help = "Save root (overrides the config file)")]
    pub root: Option<PathBuf>,

    #[arg(short, long, global = true, env = "DURASYNC_CONFIG", help = "Path to durasync.json")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Print a record, recovering from backups if needed")]
    Get {
        slot: String,
        key: String,
    },

    #[command(about = "Write a JSON document as the record's new payload")]
    Put {
        slot: String,
        key: String,

        #[arg(help = "JSON document, e.g. '{\"level\":3}'")]
        json: String,
    },

    #[command(about = "Delete a record and all of its backups")]
    Delete { slot: String, key: String },

    #[command(about = "Check whether a record's primary file exists")]
    Exists { slot: String, key: String },

    #[command(about = "List a record's rolling backups, newest first")]
    Backups { slot: String, key: String },

    #[command(subcommand, about = "Inspect the persisted cloud function queue")]
    Queue(QueueCommands),

    #[command(subcommand, about = "View or initialize configuration")]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum QueueCommands {
    #[command(about = "List queued calls, oldest first")]
    List {
        #[arg(short, long, help = "Queue document (defaults to the configured location)")]
        file: Option<PathBuf>,

        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Drop every queued call")]
    Clear {
        #[arg(short, long, help = "Queue document (defaults to the configured location)")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show the effective configuration")]
    Show,

    #[command(about = "Write a default config file if none exists")]
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_put() {
        let cli = Cli::try_parse_from(["durasync", "--root", "/tmp/saves", "put", "profile", "main", "{}"])
            .expect("parse");
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/saves")));
        assert!(matches!(cli.command, Commands::Put { ref slot, ref json, .. } if slot == "profile" && json == "{}"));
    }
}
