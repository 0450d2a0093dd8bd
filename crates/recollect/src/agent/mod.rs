//! Agent invocation contract.
//!
//! An [`Agent`] answers one user message given the conversation so far and
//! the current instructions. It reports streamed text and tool activity
//! through the caller's [`EventHandler`] and returns the messages the turn
//! produced, which the conversation loop appends to its history.
//!
//! - [`openrouter`]: [`OpenRouterAgent`], a chat-completions agent with a
//!   tool loop and optional SSE streaming.
//! - [`feedback`]: [`FeedbackRecorder`], a decorator that annotates every
//!   successful invocation with a feedback score.

pub mod feedback;
pub mod openrouter;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use feedback::{FeedbackRecord, FeedbackRecorder};
pub use openrouter::{AgentConfig, OpenRouterAgent};

use crate::events::EventHandler;
use crate::{Message, MessageKind, Result, TokenUsage};

/// Boxed future returned by [`Agent::invoke`].
pub type AgentFuture<'a> = Pin<Box<dyn Future<Output = Result<AgentTurn>> + Send + 'a>>;

/// Everything an agent needs for one turn.
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    /// Prior conversation, already processed by the history policy.
    pub history: &'a [Message],
    /// The new user message.
    pub input: &'a str,
    /// System instructions, including any memory section.
    pub instructions: &'a str,
}

/// The outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTurn {
    /// New messages: the user prompt first, the final agent text last, any
    /// tool calls and returns in between.
    pub messages: Vec<Message>,
    /// Correlation id of this invocation.
    pub trace_id: String,
    /// Model that produced the answer, when known.
    pub model: Option<String>,
}

impl AgentTurn {
    pub fn new(messages: Vec<Message>, trace_id: impl Into<String>) -> Self {
        Self {
            messages,
            trace_id: trace_id.into(),
            model: None,
        }
    }

    /// Text of the final agent message.
    pub fn text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.kind() == MessageKind::AgentText)
            .and_then(Message::text)
            .unwrap_or_default()
    }

    /// Usage recorded across every response in the turn.
    pub fn usage(&self) -> TokenUsage {
        self.messages
            .iter()
            .filter_map(Message::usage)
            .fold(TokenUsage::default(), |acc, u| {
                TokenUsage::new(
                    acc.input_tokens.saturating_add(u.input_tokens),
                    acc.output_tokens.saturating_add(u.output_tokens),
                )
            })
    }
}

/// Something that can answer a user message.
pub trait Agent: Send + Sync {
    fn invoke<'a>(&'a self, request: AgentRequest<'a>, events: &'a dyn EventHandler)
    -> AgentFuture<'a>;
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn invoke<'a>(
        &'a self,
        request: AgentRequest<'a>,
        events: &'a dyn EventHandler,
    ) -> AgentFuture<'a> {
        (**self).invoke(request, events)
    }
}

impl<A: Agent + ?Sized> Agent for Arc<A> {
    fn invoke<'a>(
        &'a self,
        request: AgentRequest<'a>,
        events: &'a dyn EventHandler,
    ) -> AgentFuture<'a> {
        (**self).invoke(request, events)
    }
}
