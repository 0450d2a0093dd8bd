//! Everything between the agent/summarizer and the chat completions API.
//!
//! - [`wire`]: request and response shapes.
//! - [`client`]: [`OpenRouterClient`] and the non-streaming call.
//! - [`streaming`]: SSE parser producing [`StreamEvent`] values.
//! - [`retry`]: transient-error retries with exponential backoff.
//! - [`tracing`]: trace ids, per-model pricing and [`CostTracker`].

pub mod client;
pub mod retry;
pub mod streaming;
pub mod tracing;
pub mod wire;

pub use client::{OPENROUTER_URL, OpenRouterClient};
pub use retry::{RetryConfig, with_retry};
pub use streaming::{StreamEvent, completion_from_events};
pub use tracing::{CostTracker, ModelPricing, generate_trace_id, pricing_for_model};
pub use wire::{
    ChatCompletion, ChatMessage, ChatRequest, ChatRole, ResponseFormat, ToolCallData, ToolDef,
    UsageInfo,
};
