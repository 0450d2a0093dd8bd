//! Convenience re-exports for common `recollect` types.
//!
//! ```ignore
//! use recollect::prelude::*;
//! ```
//!
//! Streaming events, wire types and the summarizer prompts are left out;
//! import those from their modules when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    DiscussedSubject, Error, History, MemoryRecord, Message, MessageKind, Result, TokenUsage,
    json_schema_for,
};

// ── Conversation ────────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentConfig, AgentRequest, AgentTurn, FeedbackRecorder, OpenRouterAgent,
};
pub use crate::conversation::{Conversation, InputSource, ScriptedInput, is_quit_command};
pub use crate::events::{
    CompositeEventHandler, ConversationEvent, EventHandler, FnEventHandler, LoggingHandler,
    NoopHandler,
};
pub use crate::prompt::InstructionsBuilder;

// ── History ─────────────────────────────────────────────────────────
pub use crate::history::{
    CountThreshold, HistoryPolicy, Passthrough, PolicyDecision, RecentWindow, TokenCounting,
    TokenThreshold,
};
pub use crate::summarizer::{LlmSummarizer, Summarizer, SummarizerConfig};

// ── API and tools ───────────────────────────────────────────────────
pub use crate::api::{CostTracker, OpenRouterClient, RetryConfig};
pub use crate::tools::{FnTool, Tool, ToolSet, default_tools};
