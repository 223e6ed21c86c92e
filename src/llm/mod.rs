//! Endpoint resolution for a local model runtime (Ollama or any
//! OpenAI-compatible server on the same machine).
//!
//! A single chat completion is attempted against an ordered list of candidate
//! base URLs — the primary first, then the caller's fallbacks — stopping at
//! the first success. Candidates are tried strictly sequentially: racing them
//! in parallel could hand the same completion to several runtimes at once,
//! and only one runtime is expected to be live on a local machine anyway.
//!
//! Only loopback-style URLs are eligible. The resolver exists to reach a
//! runtime on the same machine and must never become a generic proxy for
//! arbitrary network targets.

mod transport;

pub use transport::{ChatTransport, HttpTransport, TransportError, TransportResponse};

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Per-candidate completion timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Availability probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const LOOPBACK_MARKERS: [&str; 3] = ["localhost", "127.0.0.1", "0.0.0.0"];

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// Every candidate was exhausted without a completion. Carries the full
    /// candidate count (including skipped ones) and the most recent
    /// underlying failure; earlier failures are logged but not surfaced.
    #[error(
        "failed to reach a local model runtime: tried {tried} URL(s), \
         last error: {last_error}; make sure the runtime (e.g. Ollama) is running locally"
    )]
    Exhausted { tried: usize, last_error: String },
}

/// Outcome of one candidate attempt.
enum Attempt {
    Skipped(SkipReason),
    Failed(String),
    Succeeded(String),
}

enum SkipReason {
    /// Empty candidate strings are ignored without logging.
    Empty,
    /// Failed the loopback-only policy.
    NonLoopback,
}

pub struct EndpointResolver<T: ChatTransport> {
    transport: T,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl EndpointResolver<HttpTransport> {
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }
}

impl Default for EndpointResolver<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ChatTransport> EndpointResolver<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            request_timeout: REQUEST_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the per-attempt and probe timeouts (defaults:
    /// [`REQUEST_TIMEOUT`], [`PROBE_TIMEOUT`]).
    pub fn with_timeouts(mut self, request: Duration, probe: Duration) -> Self {
        self.request_timeout = request;
        self.probe_timeout = probe;
        self
    }

    /// Try `primary` then each of `fallbacks` in order for one non-streaming
    /// chat completion, returning the first non-empty reply.
    ///
    /// Candidates are kept in caller order without deduplication. Empty
    /// entries are skipped silently; non-loopback entries are skipped with a
    /// warning. Transport failures, timeouts, error statuses, and replies
    /// with no content all count as one exhausted candidate and fall through
    /// to the next. When nothing succeeds the aggregate
    /// [`ResolverError::Exhausted`] is the only error callers see.
    pub async fn resolve_and_complete(
        &self,
        primary: &str,
        model: &str,
        prompt: &str,
        fallbacks: &[String],
    ) -> Result<String, ResolverError> {
        let mut candidates = Vec::with_capacity(1 + fallbacks.len());
        candidates.push(primary.to_string());
        candidates.extend(fallbacks.iter().cloned());

        let mut last_error: Option<String> = None;

        for url in &candidates {
            match self.attempt(url, model, prompt).await {
                Attempt::Succeeded(reply) => return Ok(reply),
                Attempt::Skipped(SkipReason::Empty) => {}
                Attempt::Skipped(SkipReason::NonLoopback) => {
                    warn!("Skipping non-localhost URL: {url}");
                }
                Attempt::Failed(message) => {
                    warn!("Failed to connect to {url}: {message}");
                    last_error = Some(message);
                }
            }
        }

        Err(ResolverError::Exhausted {
            tried: candidates.len(),
            last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Lightweight availability check: GET `{url}/models` with a short
    /// timeout. `true` only on a successful status; never errors.
    pub async fn probe(&self, url: &str) -> bool {
        match self.transport.probe_models(url, self.probe_timeout).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                debug!("Probe of {url} failed: {e}");
                false
            }
        }
    }

    async fn attempt(&self, url: &str, model: &str, prompt: &str) -> Attempt {
        if url.is_empty() {
            return Attempt::Skipped(SkipReason::Empty);
        }
        if !is_loopback(url) {
            return Attempt::Skipped(SkipReason::NonLoopback);
        }

        let body = json!({
            "model": model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "stream": false,
            "temperature": 0.7,
            "max_tokens": 1000
        });

        debug!("Attempting chat completion against {url}");

        let response = match self
            .transport
            .chat_completion(url, &body, self.request_timeout)
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        if !response.is_success() {
            return Attempt::Failed(format!(
                "HTTP {}: {}",
                response.status, response.status_text
            ));
        }

        match response
            .body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
        {
            Some(content) if !content.is_empty() => Attempt::Succeeded(content.to_string()),
            _ => Attempt::Failed("no response content from local runtime".to_string()),
        }
    }
}

fn is_loopback(url: &str) -> bool {
    LOOPBACK_MARKERS.iter().any(|marker| url.contains(marker))
}
