//! SharedLM local-first core — durable local storage for chat transcripts
//! and extracted memories with deferred sync scheduling, plus a
//! fallback-aware resolver for reaching a local model runtime.
//!
//! This crate provides:
//! - A local store over a pluggable key-value substrate (chats, memories,
//!   sync metadata) that degrades to safe defaults instead of erroring
//! - Pull-based sync scheduling: callers ask whether a flush to the remote
//!   store is due and record syncs explicitly
//! - Endpoint resolution for OpenAI-compatible local runtimes (Ollama) with
//!   ordered fallback, per-attempt timeouts, and a loopback-only policy

pub mod cli;
pub mod config;
pub mod llm;
pub mod store;

pub use config::Config;
