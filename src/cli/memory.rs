use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::config::Config;
use crate::store::{NewMemory, DEFAULT_SEARCH_LIMIT};

#[derive(Args)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommands,
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Add a memory record
    Add {
        /// Extracted memory text
        text: String,

        /// Owning user id
        #[arg(long)]
        user_id: String,

        /// Optional project id
        #[arg(long)]
        project_id: Option<String>,

        /// Source conversation messages, as a JSON array
        #[arg(long)]
        messages: Option<String>,
    },

    /// Search memories by substring (case-insensitive)
    Search {
        query: String,

        #[arg(long)]
        user_id: String,

        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// List all memory records as JSON
    List,
}

pub fn run(args: MemoryArgs, config: &Config) -> Result<()> {
    let store = super::open_store(config)?;

    match args.command {
        MemoryCommands::Add {
            text,
            user_id,
            project_id,
            messages,
        } => {
            let messages: Vec<Value> = match messages {
                Some(raw) => {
                    serde_json::from_str(&raw).context("--messages must be a JSON array")?
                }
                None => Vec::new(),
            };

            match store.add_memory(NewMemory {
                user_id,
                messages,
                memory: Some(text),
                project_id,
            }) {
                Some(record) => println!("Added memory {}", record.id),
                None => anyhow::bail!("failed to persist memory"),
            }
        }
        MemoryCommands::Search {
            query,
            user_id,
            limit,
        } => {
            let results = store.search_memories(&query, &user_id, limit);
            if results.is_empty() {
                println!("No matching memories");
            }
            for memory in results {
                println!("{memory}");
            }
        }
        MemoryCommands::List => {
            println!("{}", serde_json::to_string_pretty(&store.memories())?);
        }
    }

    Ok(())
}
