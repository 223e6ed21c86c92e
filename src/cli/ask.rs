use anyhow::Result;
use chrono::Utc;
use clap::Args;
use serde_json::{json, Value};

use crate::config::Config;
use crate::llm::EndpointResolver;
use crate::store::ChatRecord;

#[derive(Args)]
pub struct AskArgs {
    /// The prompt to send
    pub prompt: String,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Chat id to append to (a new id is generated when omitted)
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub async fn run(args: AskArgs, config: &Config) -> Result<()> {
    let model = args.model.as_deref().unwrap_or(&config.llm.model);

    let resolver = EndpointResolver::new();
    let reply = resolver
        .resolve_and_complete(
            &config.llm.endpoint,
            model,
            &args.prompt,
            &config.llm.fallback_endpoints,
        )
        .await?;

    // Record the exchange locally. The store logs its own failures and never
    // blocks the reply.
    let store = super::open_store(config)?;
    let chat_id = args
        .chat_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut chat = store
        .chats()
        .into_iter()
        .find(|c| c.id == chat_id)
        .unwrap_or_else(|| ChatRecord::new(&chat_id));

    let messages = chat
        .fields
        .entry("messages".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(list) = messages {
        list.push(json!({ "role": "user", "content": args.prompt }));
        list.push(json!({ "role": "assistant", "content": reply }));
    }
    chat.fields
        .insert("model".to_string(), json!(model));
    chat.fields
        .insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
    store.save_chat(&chat);

    match args.format.as_str() {
        "json" => {
            let output = json!({
                "chat_id": chat_id,
                "prompt": args.prompt,
                "reply": reply,
                "model": model,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{reply}");
        }
    }

    Ok(())
}
