use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::store::SyncMetadataPatch;

#[derive(Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommands,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show sync metadata and whether a sync is due
    Status,

    /// Print the pending sync payload (chats, memories, metadata) as JSON
    Export,

    /// Record that a sync happened and schedule the next one
    Mark {
        /// Sync interval in days (overrides config)
        #[arg(long)]
        interval_days: Option<i64>,
    },

    /// Delete synced chats and memories (sync metadata is kept)
    Clear,
}

pub fn run(args: SyncArgs, config: &Config) -> Result<()> {
    let store = super::open_store(config)?;

    match args.command {
        SyncCommands::Status => {
            let metadata = store.sync_metadata();
            println!(
                "Last sync:      {}",
                metadata
                    .last_sync
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
            println!(
                "Next sync due:  {}",
                metadata
                    .next_sync_due
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "now".to_string())
            );
            println!("Interval:       {} days", metadata.sync_interval_days);
            println!("Sync due:       {}", store.is_sync_due());
        }
        SyncCommands::Export => {
            println!(
                "{}",
                serde_json::to_string_pretty(&store.export_local_data())?
            );
        }
        SyncCommands::Mark { interval_days } => {
            let patch = SyncMetadataPatch {
                sync_interval_days: interval_days.or(Some(config.sync.interval_days)),
            };
            match store.update_sync_metadata(patch) {
                Some(metadata) => println!(
                    "Recorded sync; next due {}",
                    metadata
                        .next_sync_due
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default()
                ),
                None => anyhow::bail!("failed to persist sync metadata"),
            }
        }
        SyncCommands::Clear => {
            if store.clear_local_data() {
                println!("Cleared local chats and memories");
            } else {
                anyhow::bail!("failed to clear local data");
            }
        }
    }

    Ok(())
}
