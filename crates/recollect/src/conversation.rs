//! The conversation loop.
//!
//! [`Conversation`] owns the history and the long-term memory. Each
//! submitted message goes through the same steps:
//!
//! 1. the [`HistoryPolicy`] runs on the history as it stands, which is
//!    *before* the new exchange is added. A history can therefore sit one
//!    exchange over the policy's trigger until the next turn;
//! 2. a returned [`MemoryRecord`] replaces the stored one;
//! 3. instructions are rebuilt with the memory, the user's name and today's
//!    date;
//! 4. the agent is invoked and its messages are appended.
//!
//! A failed agent invocation is reported through
//! [`ConversationEvent::AgentFailed`] and the turn is dropped; whatever the
//! policy did to the history in step 1 is kept.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::agent::{Agent, AgentRequest, AgentTurn};
use crate::api::CostTracker;
use crate::events::{ConversationEvent, EventHandler};
use crate::history::HistoryPolicy;
use crate::message::total_recorded_tokens;
use crate::prompt::InstructionsBuilder;
use crate::{History, MemoryRecord, Message, Result};

/// Where the conversation loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Processing,
}

/// Boxed future returned by [`InputSource::next_line`].
pub type InputFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

/// A source of user messages. `Ok(None)` means end of input.
pub trait InputSource: Send {
    fn next_line(&mut self) -> InputFuture<'_>;
}

/// A fixed list of messages, replayed in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// One message per non-blank line of `script`.
    pub fn from_script(script: &str) -> Self {
        Self::new(
            script
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl InputSource for ScriptedInput {
    fn next_line(&mut self) -> InputFuture<'_> {
        let line = self.lines.pop_front();
        Box::pin(async move { Ok(line) })
    }
}

/// `quit` or `q`, ignoring case and surrounding whitespace.
pub fn is_quit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("q")
}

/// A single conversation between a user and an agent.
pub struct Conversation {
    agent: Box<dyn Agent>,
    policy: Box<dyn HistoryPolicy>,
    history: History,
    memory: Option<MemoryRecord>,
    instructions: String,
    user_name: Option<String>,
    sections: Vec<(String, String)>,
    turn: u32,
    state: LoopState,
    costs: CostTracker,
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("policy", &self.policy.name())
            .field("history", &self.history.len())
            .field("has_memory", &self.memory.is_some())
            .field("turn", &self.turn)
            .field("state", &self.state)
            .finish()
    }
}

impl Conversation {
    pub fn new(agent: impl Agent + 'static, policy: impl HistoryPolicy + 'static) -> Self {
        Self {
            agent: Box::new(agent),
            policy: Box::new(policy),
            history: Vec::new(),
            memory: None,
            instructions: String::new(),
            user_name: None,
            sections: Vec::new(),
            turn: 0,
            state: LoopState::AwaitingInput,
            costs: CostTracker::new(),
        }
    }

    /// Base instructions placed ahead of every generated section.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_user_name(mut self, name: Option<String>) -> Self {
        self.user_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Extra `## heading` section appended after the memory.
    pub fn with_section(mut self, heading: impl Into<String>, content: impl Into<String>) -> Self {
        self.sections.push((heading.into(), content.into()));
        self
    }

    /// Start from an existing history instead of an empty one.
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn with_memory(mut self, memory: MemoryRecord) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn memory(&self) -> Option<&MemoryRecord> {
        self.memory.as_ref()
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn policy(&self) -> &dyn HistoryPolicy {
        self.policy.as_ref()
    }

    /// Agent usage and estimated cost across all turns.
    pub fn cost(&self) -> &CostTracker {
        &self.costs
    }

    /// Instructions as they would be sent on `date`.
    pub fn build_instructions(&self, date: NaiveDate) -> String {
        self.sections
            .iter()
            .fold(
                InstructionsBuilder::new(self.instructions.as_str())
                    .memory(self.memory.as_ref()),
                |builder, (heading, content)| builder.section(heading, content.as_str()),
            )
            .user_name(self.user_name.as_deref())
            .date(date)
            .build()
    }

    async fn apply_policy(&mut self, events: &dyn EventHandler) {
        let history = std::mem::take(&mut self.history);
        let before = history.len();
        let outcome = self.policy.apply(history, self.memory.as_ref()).await;

        events.on_event(&ConversationEvent::PolicyApplied {
            policy: self.policy.name(),
            decision: &outcome.decision,
            before,
            after: outcome.history.len(),
        });

        self.history = outcome.history;
        if let Some(memory) = outcome.memory {
            debug!(
                "Memory replaced: {} context item(s), {} subject(s)",
                memory.user_context.len(),
                memory.discussed_subjects.len()
            );
            self.memory = Some(memory);
        }
    }

    /// Run one turn for `input`.
    ///
    /// On success the turn's messages are already appended to the history.
    /// On failure the error has been reported as
    /// [`ConversationEvent::AgentFailed`] and nothing was appended.
    pub async fn submit(&mut self, input: &str, events: &dyn EventHandler) -> Result<AgentTurn> {
        self.state = LoopState::Processing;
        self.turn += 1;
        let turn = self.turn;
        events.on_event(&ConversationEvent::TurnStart { turn, input });

        self.apply_policy(events).await;
        let instructions = self.build_instructions(Utc::now().date_naive());

        let request = AgentRequest {
            history: &self.history,
            input,
            instructions: &instructions,
        };
        let result = self.agent.invoke(request, events).await;
        self.state = LoopState::AwaitingInput;

        match result {
            Ok(agent_turn) => {
                if let Some(model) = agent_turn.model.as_deref() {
                    self.costs.record(model, agent_turn.usage());
                }
                self.history.extend(agent_turn.messages.iter().cloned());
                events.on_event(&ConversationEvent::TurnFinished {
                    turn,
                    history_len: self.history.len(),
                    total_tokens: total_recorded_tokens(&self.history),
                    token_limit: self.policy.token_limit(),
                });
                Ok(agent_turn)
            }
            Err(error) => {
                events.on_event(&ConversationEvent::AgentFailed {
                    turn,
                    error: &error,
                });
                Err(error)
            }
        }
    }

    /// Read and answer messages until a quit command or end of input.
    ///
    /// Agent failures do not stop the loop. Only input errors do.
    pub async fn run(
        &mut self,
        input: &mut dyn InputSource,
        events: &dyn EventHandler,
    ) -> Result<()> {
        loop {
            self.state = LoopState::AwaitingInput;
            let Some(line) = input.next_line().await? else {
                info!("End of input after {} turn(s)", self.turn);
                return Ok(());
            };
            if is_quit_command(&line) {
                info!("Quit after {} turn(s)", self.turn);
                return Ok(());
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            if let Err(e) = self.submit(line, events).await {
                debug!("Turn {} discarded: {e}", self.turn);
            }
        }
    }
}
