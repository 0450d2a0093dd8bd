//! Events and handlers for observing a conversation.
//!
//! The conversation loop, the agent and the feedback decorator report what
//! they are doing through [`ConversationEvent`] values. Callers implement
//! [`EventHandler`] to render output, log, or collect statistics.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or silent runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use tracing::{debug, info, trace, warn};

use crate::Error;
use crate::history::PolicyDecision;

/// Events emitted while a conversation runs.
#[derive(Debug)]
pub enum ConversationEvent<'a> {
    /// A user message was read and a turn is starting.
    TurnStart { turn: u32, input: &'a str },
    /// The history policy ran before the agent call.
    PolicyApplied {
        policy: &'a str,
        decision: &'a PolicyDecision,
        before: usize,
        after: usize,
    },
    /// Incremental agent text. In non-streaming mode the whole answer
    /// arrives as a single delta.
    TextDelta(&'a str),
    /// A tool is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A tool finished executing.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// Token usage reported by the API for one response.
    TokenUsage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// A feedback annotation was attached to the finished invocation.
    FeedbackRecorded {
        trace_id: &'a str,
        name: &'a str,
        score: f64,
    },
    /// The turn completed and its messages were appended.
    TurnFinished {
        turn: u32,
        history_len: usize,
        /// Recorded tokens across the whole history.
        total_tokens: u64,
        /// Token budget of the active policy, if it has one.
        token_limit: Option<u64>,
    },
    /// The agent invocation failed; the turn was discarded.
    AgentFailed { turn: u32, error: &'a Error },
}

impl ConversationEvent<'_> {
    /// Share of the token budget used, as a percentage, for `TurnFinished`
    /// events of policies that have a budget.
    pub fn limit_percent(&self) -> Option<f64> {
        match self {
            ConversationEvent::TurnFinished {
                total_tokens,
                token_limit: Some(limit),
                ..
            } if *limit > 0 => Some(*total_tokens as f64 / *limit as f64 * 100.0),
            _ => None,
        }
    }
}

/// Handler for conversation events. The default implementation ignores
/// everything.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ConversationEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let ConversationEvent::TextDelta(text) = event {
///         print!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&ConversationEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&ConversationEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&ConversationEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &ConversationEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &ConversationEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &ConversationEvent<'_>) {
        match event {
            ConversationEvent::TurnStart { turn, input } => {
                let preview: String = input.chars().take(80).collect();
                info!("[turn {turn}] user: {preview}");
            }
            ConversationEvent::PolicyApplied {
                policy,
                decision,
                before,
                after,
            } => match decision {
                PolicyDecision::Unchanged => {
                    debug!("History policy {policy}: unchanged ({before} messages)");
                }
                PolicyDecision::Failed { error } => {
                    warn!("History policy {policy} failed, history kept ({before} messages): {error}");
                }
                PolicyDecision::Deferred { boundary } => {
                    info!("History policy {policy}: deferred, boundary {boundary} splits a tool call");
                }
                other => info!("History policy {policy}: {other} ({before} -> {after} messages)"),
            },
            ConversationEvent::TextDelta(delta) => {
                let preview: String = delta.chars().take(80).collect();
                trace!("Stream text delta: {preview}");
            }
            ConversationEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            ConversationEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            ConversationEvent::TokenUsage {
                input_tokens,
                output_tokens,
            } => {
                debug!("Tokens: input={input_tokens}, output={output_tokens}");
            }
            ConversationEvent::FeedbackRecorded {
                trace_id,
                name,
                score,
            } => {
                info!("Feedback {name}={score} recorded for {trace_id}");
            }
            ConversationEvent::TurnFinished {
                turn,
                history_len,
                total_tokens,
                ..
            } => match event.limit_percent() {
                Some(pct) => info!(
                    "[turn {turn}] finished: {history_len} messages, {total_tokens} tokens ({pct:.1}% of limit)"
                ),
                None => info!(
                    "[turn {turn}] finished: {history_len} messages, {total_tokens} tokens"
                ),
            },
            ConversationEvent::AgentFailed { turn, error } => {
                warn!("[turn {turn}] agent failed: {error}");
            }
        }
    }
}
