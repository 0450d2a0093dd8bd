//! Conversation history management for LLM chat agents.
//!
//! `recollect` keeps a running conversation inside a model's context window.
//! Before every agent call a pluggable [`HistoryPolicy`](history::HistoryPolicy)
//! decides what to do with the accumulated history: leave it alone, trim it
//! to a recent window, condense its older half into a summary, or
//! consolidate it into a structured [`MemoryRecord`] that is carried in the
//! agent's instructions instead of the transcript.
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use recollect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> recollect::Result<()> {
//!     let client = Arc::new(OpenRouterClient::new(std::env::var("OPENROUTER_KEY").unwrap())?);
//!
//!     let summarizer = Arc::new(LlmSummarizer::new(client.clone(), SummarizerConfig::default()));
//!     let policy = TokenThreshold::new(5_000, summarizer);
//!     let agent = OpenRouterAgent::new(client, default_tools(), AgentConfig::default());
//!
//!     let mut conversation = Conversation::new(agent, policy)
//!         .with_instructions("You are a helpful assistant.");
//!     let turn = conversation.submit("Hi, I'm Ada.", &LoggingHandler).await?;
//!     println!("{}", turn.text());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`message`] | [`Message`] variants, [`TokenUsage`], tool-call-safe cuts |
//! | [`memory`] | [`MemoryRecord`] and its markdown rendering |
//! | [`history`] | History policies: window, token threshold, count threshold |
//! | [`summarizer`] | [`Summarizer`](summarizer::Summarizer) trait and the LLM-backed implementation |
//! | [`agent`] | [`Agent`](agent::Agent) trait, OpenRouter agent, feedback decorator |
//! | [`conversation`] | The conversation loop |
//! | [`tools`] | Tool trait, dispatch, and the built-in calculator and clock |
//! | [`events`] | Events emitted while a conversation runs, and handlers |
//! | [`prompt`] | Instructions builder |
//! | [`api`] | OpenRouter client, SSE streaming, retries, cost tracking |

pub mod agent;
pub mod api;
pub mod conversation;
pub mod error;
pub mod events;
pub mod history;
pub mod memory;
pub mod message;
pub mod prelude;
pub mod prompt;
pub mod summarizer;
pub mod tools;

use schemars::JsonSchema;

pub use error::{Error, Result};
pub use memory::{DiscussedSubject, MemoryRecord};
pub use message::{History, Message, MessageKind, TokenUsage};

/// Model used by the agent when none is configured.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Generate a JSON Schema value for a type.
///
/// Used for tool parameter schemas and for the structured-output schema the
/// summarizer requests.
///
/// ```
/// use recollect::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct LookupArgs {
///     query: String,
///     #[serde(default)]
///     limit: Option<u32>,
/// }
///
/// let schema = json_schema_for::<LookupArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"query".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
