use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::llm::EndpointResolver;

#[derive(Args)]
pub struct ProbeArgs {
    /// Base URL to probe (defaults to the configured endpoint and fallbacks)
    pub url: Option<String>,
}

pub async fn run(args: ProbeArgs, config: &Config) -> Result<()> {
    let resolver = EndpointResolver::new();

    let urls: Vec<String> = match args.url {
        Some(url) => vec![url],
        None => {
            let mut urls = vec![config.llm.endpoint.clone()];
            urls.extend(config.llm.fallback_endpoints.iter().cloned());
            urls
        }
    };

    let mut any_available = false;
    for url in &urls {
        let available = resolver.probe(url).await;
        any_available |= available;
        println!(
            "{url}: {}",
            if available { "available" } else { "unavailable" }
        );
    }

    if !any_available {
        std::process::exit(1);
    }
    Ok(())
}
