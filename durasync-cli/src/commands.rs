use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use durasync_core::config::{load_config, save_config};
use durasync_core::remote::{FileQueueStore, QueueStore};
use durasync_core::save::{
    data_dir, FileSaveStore, JsonSaveSerializer, LocalSaveService, SaveSerializer, SecureSaveSerializer,
};
use durasync_types::FoundationConfig;

use crate::cli::{Cli, ConfigCommands, QueueCommands};

const CONFIG_FILE: &str = "durasync.json";

/// Everything a command needs, resolved once from flags, env and the config file.
pub struct Context {
    pub config_path: PathBuf,
    pub config: FoundationConfig,
    pub queue_dir: PathBuf,
    cancel: CancellationToken,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let base = data_dir()?;
        let config_path = cli.config.clone().unwrap_or_else(|| base.join(CONFIG_FILE));
        let mut config = load_config(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        if let Some(root) = &cli.root {
            config.storage.root = Some(root.clone());
        }
        debug!(config = %config_path.display(), data_dir = %base.display(), "Context resolved");
        Ok(Self::new(config_path, config, base))
    }

    pub fn new(config_path: PathBuf, config: FoundationConfig, queue_dir: PathBuf) -> Self {
        Self { config_path, config, queue_dir, cancel: CancellationToken::new() }
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    fn save_service(&self) -> Result<LocalSaveService> {
        let json: Arc<dyn SaveSerializer> = Arc::new(JsonSaveSerializer::pretty());
        let serializer: Arc<dyn SaveSerializer> = if self.config.security.protection_enabled() {
            Arc::new(
                SecureSaveSerializer::new(json, self.config.security.clone(), None)
                    .context("Encrypted saves need an application-provided cipher")?,
            )
        } else {
            json
        };
        Ok(LocalSaveService::from_config(Arc::new(FileSaveStore::new()), serializer, &self.config)?)
    }

    fn queue_store(&self, file: Option<PathBuf>) -> FileQueueStore {
        match file {
            Some(path) => FileQueueStore::new(path),
            None => FileQueueStore::from_config(&self.queue_dir, &self.config.reliability),
        }
    }
}

pub async fn handle_get(ctx: &Context, slot: &str, key: &str) -> Result<()> {
    let service = ctx.save_service()?;
    if !service.exists(slot, key).await? {
        println!("{}", format!("No record {}/{}", slot, key).yellow());
        return Ok(());
    }

    let value: Value = service.load(slot, key, Value::Null, ctx.cancel()).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub async fn handle_put(ctx: &Context, slot: &str, key: &str, json: &str) -> Result<()> {
    let value: Value = serde_json::from_str(json).context("Payload is not valid JSON")?;
    ctx.save_service()?.save(slot, key, &value, ctx.cancel()).await?;
    println!("{} Saved {}/{}", "✓".green(), slot, key);
    Ok(())
}

pub async fn handle_delete(ctx: &Context, slot: &str, key: &str) -> Result<()> {
    ctx.save_service()?.delete(slot, key, ctx.cancel()).await?;
    println!("{} Deleted {}/{}", "✓".green(), slot, key);
    Ok(())
}

pub async fn handle_exists(ctx: &Context, slot: &str, key: &str) -> Result<()> {
    let exists = ctx.save_service()?.exists(slot, key).await?;
    println!("{}", exists);
    Ok(())
}

pub async fn handle_backups(ctx: &Context, slot: &str, key: &str) -> Result<()> {
    let backups = ctx.save_service()?.backup_paths(slot, key).await?;
    if backups.is_empty() {
        println!("{}", "No backups found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Path", "Bytes"]);
    for (index, path) in &backups {
        let bytes = tokio::fs::metadata(path).await.map(|m| m.len().to_string()).unwrap_or_else(|_| "-".into());
        table.add_row(vec![index.to_string(), path.display().to_string(), bytes]);
    }
    println!("{table}");
    Ok(())
}

pub async fn handle_queue_command(ctx: &Context, cmd: QueueCommands) -> Result<()> {
    match cmd {
        QueueCommands::List { file, json } => {
            let store = ctx.queue_store(file);
            let items = store.load().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
                return Ok(());
            }
            if items.is_empty() {
                println!("{}", "Queue is empty.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Function", "Enqueued", "Payload bytes", "Id"]);
            for item in &items {
                table.add_row(vec![
                    item.function_name.clone(),
                    item.enqueued_at.to_rfc3339(),
                    item.payload_json.len().to_string(),
                    item.id.to_string(),
                ]);
            }
            println!("{table}");
            println!("\n{} queued calls in {}", items.len(), store.path().display());
            Ok(())
        }
        QueueCommands::Clear { file } => {
            let store = ctx.queue_store(file);
            store.clear().await?;
            println!("{} Queue cleared", "✓".green());
            Ok(())
        }
    }
}

pub fn handle_config_command(ctx: &Context, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&ctx.config)?);
            Ok(())
        }
        ConfigCommands::Init => {
            if ctx.config_path.exists() {
                println!("{} already exists", ctx.config_path.display());
                return Ok(());
            }
            save_config(&ctx.config_path, &FoundationConfig::default())?;
            println!("{} Wrote {}", "✓".green(), ctx.config_path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn context(dir: &std::path::Path) -> Context {
        let mut config = FoundationConfig::default();
        config.storage.root = Some(dir.join("saves"));
        Context::new(dir.join(CONFIG_FILE), config, dir.to_path_buf())
    }

    #[tokio::test]
    async fn test_put_writes_record_and_backups() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        handle_put(&ctx, "profile", "main", r#"{"level":1}"#).await.unwrap();
        handle_put(&ctx, "profile", "main", r#"{"level":2}"#).await.unwrap();

        let service = ctx.save_service().unwrap();
        let value: Value = service.load("profile", "main", Value::Null, ctx.cancel()).await.unwrap();
        assert_eq!(value["level"], 2);
        let backups = service.backup_paths("profile", "main").await.unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].0, 0);
    }

    #[tokio::test]
    async fn test_backups_keep_their_real_index_across_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        for level in 1..=3 {
            handle_put(&ctx, "profile", "main", &format!(r#"{{"level":{}}}"#, level)).await.unwrap();
        }
        let service = ctx.save_service().unwrap();
        std::fs::remove_file(service.paths().backup("profile", "main", 0).unwrap()).unwrap();

        let backups = service.backup_paths("profile", "main").await.unwrap();

        assert_eq!(backups.iter().map(|(index, _)| *index).collect::<Vec<_>>(), vec![1]);
        handle_backups(&ctx, "profile", "main").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(handle_put(&context(dir.path()), "profile", "main", "{oops").await.is_err());
    }

    #[tokio::test]
    async fn test_queue_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let store = ctx.queue_store(None);
        store.save(&[durasync_types::CloudFunctionQueueItem::new("fn.a", "{}")]).await.unwrap();
        assert!(store.path().exists());

        handle_queue_command(&ctx, QueueCommands::Clear { file: None }).await.unwrap();

        assert!(!store.path().exists());
    }

    #[test]
    fn test_config_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        handle_config_command(&ctx, ConfigCommands::Init).unwrap();
        assert_eq!(load_config(&ctx.config_path).unwrap(), FoundationConfig::default());
        handle_config_command(&ctx, ConfigCommands::Init).unwrap();
    }
}
