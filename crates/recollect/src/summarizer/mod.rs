//! Summarizer contract used by the history policies.
//!
//! A [`Summarizer`] turns a span of messages into something smaller. It is
//! called at most once per policy invocation, and only with a non-empty
//! span. Implementations report failures as errors; the calling policy
//! decides what to do with them.

pub mod llm;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{MemoryRecord, Message, Result};

pub use llm::{LlmSummarizer, SummarizerConfig};

/// Boxed future returned by [`Summarizer`] methods.
pub type SummaryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Condenses message spans for the history policies.
pub trait Summarizer: Send + Sync {
    /// Replace `messages` with a shorter sequence carrying the same facts.
    fn condense<'a>(&'a self, messages: &'a [Message]) -> SummaryFuture<'a, Vec<Message>>;

    /// Merge `messages` into the structured long-term memory, starting from
    /// `existing` when there is one.
    fn consolidate<'a>(
        &'a self,
        messages: &'a [Message],
        existing: Option<&'a MemoryRecord>,
    ) -> SummaryFuture<'a, MemoryRecord>;
}

impl<S: Summarizer + ?Sized> Summarizer for Arc<S> {
    fn condense<'a>(&'a self, messages: &'a [Message]) -> SummaryFuture<'a, Vec<Message>> {
        (**self).condense(messages)
    }

    fn consolidate<'a>(
        &'a self,
        messages: &'a [Message],
        existing: Option<&'a MemoryRecord>,
    ) -> SummaryFuture<'a, MemoryRecord> {
        (**self).consolidate(messages, existing)
    }
}

/// Render messages as a plain-text transcript, one `[role]: text` block per
/// message.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        let line = match msg {
            Message::UserPrompt { content } => format!("[user]: {content}"),
            Message::AgentText { content, .. } => format!("[assistant]: {content}"),
            Message::ToolCall {
                tool_name,
                arguments,
                ..
            } => format!("[assistant -> {tool_name}]: {arguments}"),
            Message::ToolReturn {
                tool_name, content, ..
            } => format!("[{tool_name} result]: {content}"),
        };
        out.push_str(&line);
        out.push_str("\n\n");
    }
    out
}
