use anyhow::Result;
use clap::Args;

use crate::config::Config;

#[derive(Args)]
pub struct StorageArgs {
    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn run(args: StorageArgs, config: &Config) -> Result<()> {
    let store = super::open_store(config)?;
    let size = store.storage_size();

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&size)?),
        _ => {
            println!("Chats:     {} bytes", size.chats);
            println!("Memories:  {} bytes", size.memories);
            println!("Metadata:  {} bytes", size.metadata);
            println!("Total:     {} bytes ({} MB)", size.total, size.total_mb);
        }
    }

    Ok(())
}
