//! Stub agent, summarizer and event recorder shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use recollect::agent::{Agent, AgentFuture, AgentRequest, AgentTurn};
use recollect::events::{ConversationEvent, EventHandler};
use recollect::history::PolicyDecision;
use recollect::summarizer::{Summarizer, SummaryFuture};
use recollect::{DiscussedSubject, Error, MemoryRecord, Message, TokenUsage};

/// What the agent saw on one invocation.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub history: Vec<Message>,
    pub input: String,
    pub instructions: String,
}

/// Replies `"reply to <input>"`, recording `tokens` input tokens per reply.
/// Inputs listed in `fail_on` produce an agent failure instead.
#[derive(Default)]
pub struct ScriptedAgent {
    pub tokens: u32,
    pub fail_on: Vec<String>,
    pub seen: Mutex<Vec<SeenRequest>>,
}

impl ScriptedAgent {
    pub fn new(tokens: u32) -> Self {
        Self {
            tokens,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, input: &str) -> Self {
        self.fail_on.push(input.to_string());
        self
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Agent for ScriptedAgent {
    fn invoke<'a>(
        &'a self,
        request: AgentRequest<'a>,
        events: &'a dyn EventHandler,
    ) -> AgentFuture<'a> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(SeenRequest {
                history: request.history.to_vec(),
                input: request.input.to_string(),
                instructions: request.instructions.to_string(),
            });
            if self.fail_on.iter().any(|f| f == request.input) {
                return Err(Error::agent(Error::Api {
                    status: 503,
                    body: "unavailable".into(),
                }));
            }
            let reply = format!("reply to {}", request.input);
            events.on_event(&ConversationEvent::TextDelta(&reply));
            Ok(AgentTurn::new(
                vec![
                    Message::user_prompt(request.input),
                    Message::agent_text(reply).with_usage(TokenUsage::new(self.tokens, 0)),
                ],
                "tr-scripted",
            ))
        })
    }
}

/// Summarizer with canned output that counts its calls.
#[derive(Default)]
pub struct CannedSummarizer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl CannedSummarizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> recollect::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::MalformedOutput("not json".into()))
        } else {
            Ok(())
        }
    }
}

impl Summarizer for CannedSummarizer {
    fn condense<'a>(&'a self, messages: &'a [Message]) -> SummaryFuture<'a, Vec<Message>> {
        Box::pin(async move {
            self.check()?;
            Ok(vec![Message::agent_text(format!(
                "Earlier: {} messages about the weather.",
                messages.len()
            ))])
        })
    }

    fn consolidate<'a>(
        &'a self,
        messages: &'a [Message],
        existing: Option<&'a MemoryRecord>,
    ) -> SummaryFuture<'a, MemoryRecord> {
        Box::pin(async move {
            self.check()?;
            let mut memory = existing.cloned().unwrap_or_default();
            if memory.user_context.is_empty() {
                memory.user_context.push("Name is Ada".into());
            }
            memory.discussed_subjects.push(DiscussedSubject::new(
                "Weather",
                format!("{} messages of small talk", messages.len()),
            ));
            Ok(memory)
        })
    }
}

/// Keeps a one-line description of every event.
#[derive(Default)]
pub struct RecordingHandler {
    pub lines: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.starts_with(prefix))
            .collect()
    }
}

impl EventHandler for RecordingHandler {
    fn on_event(&self, event: &ConversationEvent<'_>) {
        let line = match event {
            ConversationEvent::TurnStart { turn, .. } => format!("start {turn}"),
            ConversationEvent::PolicyApplied {
                decision,
                before,
                after,
                ..
            } => {
                let tag = match decision {
                    PolicyDecision::Unchanged => "unchanged",
                    PolicyDecision::Deferred { .. } => "deferred",
                    PolicyDecision::Trimmed { .. } => "trimmed",
                    PolicyDecision::Consolidated { .. } => "consolidated",
                    PolicyDecision::Failed { .. } => "failed",
                };
                format!("policy {tag} {before}->{after}")
            }
            ConversationEvent::TextDelta(text) => format!("text {text}"),
            ConversationEvent::ToolExecuting { name, .. } => format!("tool {name}"),
            ConversationEvent::ToolResult { name, .. } => format!("result {name}"),
            ConversationEvent::TokenUsage { .. } => "usage".to_string(),
            ConversationEvent::FeedbackRecorded { name, .. } => format!("feedback {name}"),
            ConversationEvent::TurnFinished {
                turn, history_len, ..
            } => format!("finished {turn} len={history_len}"),
            ConversationEvent::AgentFailed { turn, .. } => format!("failed {turn}"),
        };
        self.lines.lock().unwrap().push(line);
    }
}
