//! Conversation messages and the history they form.
//!
//! A [`Message`] is one turn-level unit of a conversation. The set of
//! variants is closed: user prompts, agent text, tool calls and tool
//! returns. History policies look at messages only through their
//! [`MessageKind`] tag and their size, never through their content.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Characters per token used for size estimates when the provider did not
/// report usage. Most tokenizers average 3-4 chars per token.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Ordered conversation messages, oldest first.
pub type History = Vec<Message>;

/// Token usage reported by the provider for the response that produced a
/// message.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens as u64 + self.output_tokens as u64
    }
}

/// Bare variant tag of a [`Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    UserPrompt,
    AgentText,
    ToolCall,
    ToolReturn,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::UserPrompt => write!(f, "user"),
            MessageKind::AgentText => write!(f, "agent"),
            MessageKind::ToolCall => write!(f, "tool-call"),
            MessageKind::ToolReturn => write!(f, "tool-return"),
        }
    }
}

/// A single conversation message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Text typed by the user.
    UserPrompt { content: String },
    /// Text produced by the agent.
    AgentText {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },
    /// The agent asked for a tool to be run.
    ToolCall {
        call_id: String,
        tool_name: String,
        /// Raw JSON arguments.
        arguments: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },
    /// The result of a tool run, answering the `ToolCall` with the same
    /// `call_id`.
    ToolReturn {
        call_id: String,
        tool_name: String,
        content: String,
    },
}

impl Message {
    pub fn user_prompt(content: impl Into<String>) -> Self {
        Message::UserPrompt {
            content: content.into(),
        }
    }

    pub fn agent_text(content: impl Into<String>) -> Self {
        Message::AgentText {
            content: content.into(),
            usage: None,
        }
    }

    pub fn tool_call(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Message::ToolCall {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments: arguments.into(),
            usage: None,
        }
    }

    pub fn tool_return(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::ToolReturn {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }

    /// Attach provider usage to a response message. No-op for user prompts
    /// and tool returns, which are never produced by the model.
    pub fn with_usage(mut self, recorded: TokenUsage) -> Self {
        match &mut self {
            Message::AgentText { usage, .. } | Message::ToolCall { usage, .. } => {
                *usage = Some(recorded);
            }
            Message::UserPrompt { .. } | Message::ToolReturn { .. } => {}
        }
        self
    }

    /// Drop recorded usage, e.g. once the context it measured is gone.
    pub fn without_usage(mut self) -> Self {
        if let Message::AgentText { usage, .. } | Message::ToolCall { usage, .. } = &mut self {
            *usage = None;
        }
        self
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::UserPrompt { .. } => MessageKind::UserPrompt,
            Message::AgentText { .. } => MessageKind::AgentText,
            Message::ToolCall { .. } => MessageKind::ToolCall,
            Message::ToolReturn { .. } => MessageKind::ToolReturn,
        }
    }

    pub fn is_tool_return(&self) -> bool {
        self.kind() == MessageKind::ToolReturn
    }

    /// The `call_id` linking a tool call to its return.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Message::ToolCall { call_id, .. } | Message::ToolReturn { call_id, .. } => {
                Some(call_id)
            }
            Message::UserPrompt { .. } | Message::AgentText { .. } => None,
        }
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            Message::AgentText { usage, .. } | Message::ToolCall { usage, .. } => *usage,
            Message::UserPrompt { .. } | Message::ToolReturn { .. } => None,
        }
    }

    /// Input + output tokens recorded by the provider, `0` when absent.
    pub fn recorded_tokens(&self) -> u64 {
        self.usage().map_or(0, |u| u.total())
    }

    /// Character count of the message body (text, arguments or result).
    pub fn char_len(&self) -> usize {
        match self {
            Message::UserPrompt { content }
            | Message::AgentText { content, .. }
            | Message::ToolReturn { content, .. } => content.chars().count(),
            Message::ToolCall {
                tool_name,
                arguments,
                ..
            } => tool_name.chars().count() + arguments.chars().count(),
        }
    }

    /// Token estimate from the character count.
    pub fn estimated_tokens(&self) -> u64 {
        (self.char_len() as f64 / DEFAULT_CHARS_PER_TOKEN).ceil() as u64
    }

    /// Text content for user prompts, agent text and tool returns.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::UserPrompt { content }
            | Message::AgentText { content, .. }
            | Message::ToolReturn { content, .. } => Some(content),
            Message::ToolCall { .. } => None,
        }
    }
}

/// Sum of recorded token usage across a history.
pub fn total_recorded_tokens(history: &[Message]) -> u64 {
    history.iter().map(Message::recorded_tokens).sum()
}

/// Whether cutting `history` so that it starts at `index` keeps every tool
/// call together with its return.
///
/// A cut is unsafe when the message at `index` is a tool return, or when a
/// tool call before `index` has its return at or after `index`. Cuts at the
/// ends (`0`, `len` and beyond) never split anything.
pub fn is_safe_cut(history: &[Message], index: usize) -> bool {
    if index == 0 || index >= history.len() {
        return true;
    }
    if history[index].is_tool_return() {
        return false;
    }

    let open_calls: HashSet<&str> = history[..index]
        .iter()
        .filter(|m| m.kind() == MessageKind::ToolCall)
        .filter_map(Message::call_id)
        .collect();
    if open_calls.is_empty() {
        return true;
    }

    !history[index..]
        .iter()
        .filter(|m| m.is_tool_return())
        .filter_map(Message::call_id)
        .any(|id| open_calls.contains(id))
}
