pub mod ask;
pub mod memory;
pub mod probe;
pub mod storage;
pub mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;

use crate::config::Config;
use crate::store::{FileStore, LocalStore};

#[derive(Parser)]
#[command(name = "sharedlm-local")]
#[command(author, version, about = "Local-first store and local LLM resolver for SharedLM")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "SHAREDLM_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a one-shot prompt to the local model runtime
    Ask(ask::AskArgs),

    /// Check whether a local model runtime is reachable
    Probe(probe::ProbeArgs),

    /// Local memory operations
    Memory(memory::MemoryArgs),

    /// Sync scheduling, export, and post-sync cleanup
    Sync(sync::SyncArgs),

    /// Show local storage sizes
    Storage(storage::StorageArgs),
}

pub(crate) fn open_store(config: &Config) -> Result<LocalStore<FileStore>> {
    Ok(LocalStore::new(FileStore::new(Path::new(
        &config.storage.data_dir,
    ))?))
}
