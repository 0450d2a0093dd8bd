use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::{Agent, AgentFuture, AgentRequest, AgentTurn};
use crate::api::streaming::StreamEvent;
use crate::api::{
    ChatCompletion, ChatMessage, ChatRequest, CostTracker, OpenRouterClient, RetryConfig,
    ToolCallData, completion_from_events, generate_trace_id, with_retry,
};
use crate::events::{ConversationEvent, EventHandler};
use crate::tools::ToolSet;
use crate::{DEFAULT_MODEL, Error, Message, Result, TokenUsage};

/// Settings for [`OpenRouterAgent`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on model calls per turn, tool rounds included.
    pub max_rounds: u32,
    /// Use SSE streaming so text reaches the event handler as it arrives.
    pub streaming: bool,
    pub retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            max_tokens: 4096,
            temperature: 0.7,
            max_rounds: 8,
            streaming: true,
            retry: RetryConfig::with_retries(2),
        }
    }
}

impl AgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Chat-completions agent backed by OpenRouter.
///
/// Each invocation sends the instructions as the system message, followed by
/// the history and the new user message. Tool calls requested by the model
/// are executed through the [`ToolSet`] and their results fed back until the
/// model answers with plain text or `max_rounds` is exhausted.
pub struct OpenRouterAgent {
    client: Arc<OpenRouterClient>,
    tools: ToolSet,
    config: AgentConfig,
    costs: Mutex<CostTracker>,
}

impl std::fmt::Debug for OpenRouterAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterAgent")
            .field("config", &self.config)
            .field("tools", &self.tools.names())
            .finish()
    }
}

impl OpenRouterAgent {
    pub fn new(client: Arc<OpenRouterClient>, tools: ToolSet, config: AgentConfig) -> Self {
        Self {
            client,
            tools,
            config,
            costs: Mutex::new(CostTracker::new()),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Snapshot of token usage and estimated cost across all invocations.
    pub fn cost(&self) -> CostTracker {
        self.costs.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn build_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let tools = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.definitions())
        };
        ChatRequest {
            model: Some(self.config.model.clone()),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools,
            ..Default::default()
        }
    }

    async fn send(&self, body: &ChatRequest, events: &dyn EventHandler) -> Result<ChatCompletion> {
        if self.config.streaming {
            // Once text has been shown, a failure is final for this request.
            let shown = &AtomicBool::new(false);
            let stream = with_retry(&self.config.retry, move || async move {
                let result = self
                    .client
                    .chat_stream_live(body, |event| {
                        if let StreamEvent::TextDelta(delta) = event {
                            shown.store(true, Ordering::Relaxed);
                            events.on_event(&ConversationEvent::TextDelta(delta));
                        }
                    })
                    .await;
                match result {
                    Err(e) if shown.load(Ordering::Relaxed) => {
                        warn!("Stream failed after partial output, not retrying: {e}");
                        Err(Error::StreamInterrupted(Box::new(e)))
                    }
                    other => other,
                }
            })
            .await?;
            Ok(completion_from_events(&stream))
        } else {
            let completion = with_retry(&self.config.retry, || self.client.chat(body)).await?;
            if let Some(text) = completion.content.as_deref()
                && !text.is_empty()
            {
                events.on_event(&ConversationEvent::TextDelta(text));
            }
            Ok(completion)
        }
    }

    async fn run(&self, request: AgentRequest<'_>, events: &dyn EventHandler) -> Result<AgentTurn> {
        let trace_id = generate_trace_id();
        info!(
            "Agent invocation started: trace_id={trace_id}, model={}, history={}",
            self.config.model,
            request.history.len()
        );

        let mut wire = Vec::with_capacity(request.history.len() + 2);
        if !request.instructions.is_empty() {
            wire.push(ChatMessage::system(request.instructions));
        }
        wire.extend(to_chat_messages(request.history));
        wire.push(ChatMessage::user(request.input));

        let mut produced = vec![Message::user_prompt(request.input)];

        for round in 1..=self.config.max_rounds {
            let body = self.build_request(wire.clone());
            let completion = self.send(&body, events).await?;

            let usage = completion.usage.as_ref().map(|u| u.to_token_usage());
            if let Some(u) = usage {
                events.on_event(&ConversationEvent::TokenUsage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                });
                if let Ok(mut costs) = self.costs.lock() {
                    costs.record(&self.config.model, u);
                }
            }

            let text = completion.content.filter(|t| !t.is_empty());

            if completion.tool_calls.is_empty() {
                let Some(text) = text else {
                    warn!("Empty response in round {round} (trace_id={trace_id})");
                    return Err(Error::EmptyResponse);
                };
                produced.push(attach(Message::agent_text(text), usage));
                debug!(
                    "Agent invocation finished: trace_id={trace_id}, rounds={round}, messages={}",
                    produced.len()
                );
                let mut turn = AgentTurn::new(produced, trace_id);
                turn.model = Some(self.config.model.clone());
                return Ok(turn);
            }

            // Interim text alongside tool calls is kept so the history reads
            // the way the user saw it.
            let mut usage = usage;
            if let Some(text) = text {
                produced.push(attach(Message::agent_text(text.clone()), usage.take()));
                wire.push(ChatMessage::assistant_text(text));
            }
            wire.push(ChatMessage::assistant_tool_calls(completion.tool_calls.clone()));

            let calls: Vec<(String, String)> = completion
                .tool_calls
                .iter()
                .map(|c| (c.function.name.clone(), c.function.arguments.clone()))
                .collect();
            for (i, call) in completion.tool_calls.iter().enumerate() {
                events.on_event(&ConversationEvent::ToolExecuting {
                    name: &call.function.name,
                    arguments: &call.function.arguments,
                });
                let message = Message::tool_call(
                    &call.id,
                    &call.function.name,
                    &call.function.arguments,
                );
                produced.push(if i == 0 { attach(message, usage) } else { message });
            }

            let results = self.tools.execute_all(&calls).await;
            for (call, result) in completion.tool_calls.iter().zip(results) {
                events.on_event(&ConversationEvent::ToolResult {
                    name: &call.function.name,
                    call_id: &call.id,
                    result: &result,
                });
                wire.push(ChatMessage::tool_result(&call.id, &result));
                produced.push(Message::tool_return(&call.id, &call.function.name, result));
            }
        }

        warn!(
            "Round limit of {} reached without a final answer (trace_id={trace_id})",
            self.config.max_rounds
        );
        Err(Error::RoundLimit(self.config.max_rounds))
    }
}

impl Agent for OpenRouterAgent {
    fn invoke<'a>(
        &'a self,
        request: AgentRequest<'a>,
        events: &'a dyn EventHandler,
    ) -> AgentFuture<'a> {
        Box::pin(async move { self.run(request, events).await.map_err(Error::agent) })
    }
}

fn attach(message: Message, usage: Option<TokenUsage>) -> Message {
    match usage {
        Some(u) => message.with_usage(u),
        None => message,
    }
}

/// Convert conversation history into chat-completion messages.
///
/// Consecutive tool calls become a single assistant message carrying all of
/// them, which is how the API expects parallel calls to be replayed.
pub fn to_chat_messages(history: &[Message]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(history.len());
    let mut pending: Vec<ToolCallData> = Vec::new();

    for message in history {
        if let Message::ToolCall {
            call_id,
            tool_name,
            arguments,
            ..
        } = message
        {
            pending.push(ToolCallData::new(call_id, tool_name, arguments));
            continue;
        }
        if !pending.is_empty() {
            out.push(ChatMessage::assistant_tool_calls(std::mem::take(&mut pending)));
        }
        match message {
            Message::UserPrompt { content } => out.push(ChatMessage::user(content)),
            Message::AgentText { content, .. } => out.push(ChatMessage::assistant_text(content)),
            Message::ToolReturn {
                call_id, content, ..
            } => out.push(ChatMessage::tool_result(call_id, content)),
            Message::ToolCall { .. } => {}
        }
    }
    if !pending.is_empty() {
        out.push(ChatMessage::assistant_tool_calls(pending));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatRole;
    use crate::events::NoopHandler;
    use crate::tools::default_tools;

    fn unreachable_agent(tools: ToolSet) -> OpenRouterAgent {
        let client = OpenRouterClient::new("test-key")
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/unreachable");
        OpenRouterAgent::new(
            Arc::new(client),
            tools,
            AgentConfig::default()
                .with_streaming(false)
                .with_retry(RetryConfig::default()),
        )
    }

    #[test]
    fn history_converts_to_wire_roles() {
        let history = vec![
            Message::user_prompt("what is 2+2 and the time?"),
            Message::tool_call("a", "calculator", r#"{"expression":"2+2"}"#),
            Message::tool_call("b", "check_datetime", "{}"),
            Message::tool_return("a", "calculator", "4"),
            Message::tool_return("b", "check_datetime", "2025-01-01T00:00:00Z"),
            Message::agent_text("4, and it is new year."),
        ];
        let wire = to_chat_messages(&history);
        let roles: Vec<ChatRole> = wire.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::Tool,
                ChatRole::Tool,
                ChatRole::Assistant,
            ]
        );
        let calls = wire[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[1].function.name, "check_datetime");
        assert_eq!(wire[2].tool_call_id.as_deref(), Some("a"));
    }

    #[test]
    fn trailing_tool_calls_are_flushed() {
        let history = vec![
            Message::user_prompt("hi"),
            Message::tool_call("a", "calculator", "{}"),
        ];
        let wire = to_chat_messages(&history);
        assert_eq!(wire.len(), 2);
        assert!(wire[1].tool_calls.is_some());
    }

    #[test]
    fn request_includes_tools_only_when_registered() {
        let with_tools = unreachable_agent(default_tools());
        let body = with_tools.build_request(vec![ChatMessage::user("hi")]);
        assert_eq!(body.tools.as_ref().map(Vec::len), Some(2));
        assert_eq!(body.model.as_deref(), Some(DEFAULT_MODEL));

        let bare = unreachable_agent(ToolSet::new());
        assert!(bare.build_request(Vec::new()).tools.is_none());
    }

    #[test]
    fn config_builders() {
        let config = AgentConfig::default()
            .with_model("anthropic/claude-sonnet-4")
            .with_max_tokens(512)
            .with_temperature(0.0)
            .with_max_rounds(0);
        assert_eq!(config.model, "anthropic/claude-sonnet-4");
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.max_rounds, 1);
        assert!(config.streaming);
    }

    #[tokio::test]
    async fn transport_errors_are_agent_failures() {
        let agent = unreachable_agent(ToolSet::new());
        let request = AgentRequest {
            history: &[],
            input: "hi",
            instructions: "Be brief.",
        };
        let err = agent.invoke(request, &NoopHandler).await.unwrap_err();
        assert!(err.is_agent_failure());
        assert_eq!(agent.cost().total_tokens(), 0);
    }
}
