//! Summarizer backed by a chat-completion model.
//!
//! `condense` asks for a plain-text summary and returns it as a single
//! agent message. `consolidate` asks for structured output constrained by
//! the [`MemoryRecord`] JSON Schema, validates what comes back against that
//! schema and only then deserializes it.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::{Summarizer, SummaryFuture, render_transcript};
use crate::api::{
    ChatMessage, ChatRequest, CostTracker, OpenRouterClient, ResponseFormat, RetryConfig,
    with_retry,
};
use crate::{Error, MemoryRecord, Message, Result};

/// Model used for summarization unless configured otherwise.
pub const DEFAULT_SUMMARY_MODEL: &str = "openai/gpt-4.1";

const CONDENSE_PROMPT: &str = "\
# Role
You are a memory consolidator.

# Objective
Consolidate a segment of a conversation between a user and an AI agent into \
a compact long-term memory. The segment may already start with a summary of \
earlier exchanges.

# Output
- List the essential facts, user preferences, goals and constraints that must \
be carried forward.
- Then give a chronological summary of each exchange, covering both the \
user's request and the agent's response, folding in any earlier summary.
- Refer to the agent as \"you\" and to the user as \"the user\".";

const CONSOLIDATE_PROMPT: &str = "\
## Role
You are a memory consolidator.

## Objective
Rebuild and grow the conversation memory by merging the existing long-term \
memory with a new conversation segment.

## Instructions
1. Merge: incorporate new information from the segment into the existing memory.
2. Deduplicate: merge similar context items and subjects instead of repeating them.
3. Grow: extend existing subjects with new detail, or add a subject when the topic changes.
4. Refine: keep every entry clear and concise.
5. Organize: group related subjects together.
6. Refer to the AI as \"you\" and to the other party as \"the user\".
7. Each subject summary is a dense paragraph: what was asked or explained, \
definitions, steps, examples, decisions and outcomes. No conversational filler.

## Fields
- user_context: who the user is (role, background, preferences, needs, constraints).
- discussed_subjects: what was discussed (topics, problems solved, concepts, projects).
The two must not overlap. Return the complete merged memory, not a diff.";

/// Configuration for [`LlmSummarizer`].
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub retry: RetryConfig,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.2,
            retry: RetryConfig::with_retries(2),
        }
    }
}

impl SummarizerConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// [`Summarizer`] that calls an OpenRouter model.
pub struct LlmSummarizer {
    client: Arc<OpenRouterClient>,
    config: SummarizerConfig,
    costs: Mutex<CostTracker>,
}

impl LlmSummarizer {
    pub fn new(client: Arc<OpenRouterClient>, config: SummarizerConfig) -> Self {
        Self {
            client,
            config,
            costs: Mutex::new(CostTracker::new()),
        }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Usage accumulated by this summarizer's calls so far.
    pub fn cost(&self) -> CostTracker {
        self.costs.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn build_condense_request(&self, messages: &[Message]) -> ChatRequest {
        ChatRequest {
            model: Some(self.config.model.clone()),
            messages: vec![
                ChatMessage::system(CONDENSE_PROMPT),
                ChatMessage::user(render_transcript(messages)),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            ..Default::default()
        }
    }

    pub(crate) fn build_consolidate_request(
        &self,
        messages: &[Message],
        existing: Option<&MemoryRecord>,
    ) -> ChatRequest {
        let mut content = String::new();
        if let Some(memory) = existing.filter(|m| !m.is_empty()) {
            content.push_str("=== EXISTING MEMORY ===\n");
            content.push_str(&memory.to_markdown());
            content.push_str("\n\n=== NEW CONVERSATION SEGMENT ===\n");
        }
        content.push_str(&render_transcript(messages));

        ChatRequest {
            model: Some(self.config.model.clone()),
            messages: vec![
                ChatMessage::system(CONSOLIDATE_PROMPT),
                ChatMessage::user(content),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: Some(ResponseFormat::json_schema(
                "conversation_memory",
                crate::json_schema_for::<MemoryRecord>(),
            )),
            ..Default::default()
        }
    }

    /// Send `body`, returning the text content and recording usage.
    async fn complete(&self, body: &ChatRequest) -> Result<(String, Option<crate::TokenUsage>)> {
        let completion = with_retry(&self.config.retry, || self.client.chat(body)).await?;
        let usage = completion.usage.as_ref().map(|u| u.to_token_usage());
        if let Some(usage) = usage
            && let Ok(mut costs) = self.costs.lock()
        {
            costs.record(&self.config.model, usage);
        }
        match completion.content {
            Some(text) if !text.trim().is_empty() => Ok((text, usage)),
            _ => Err(Error::EmptyResponse),
        }
    }

    async fn condense_span(&self, messages: &[Message]) -> Result<Vec<Message>> {
        if messages.is_empty() {
            return Err(Error::EmptyInput);
        }
        debug!("Condensing {} messages", messages.len());
        let (text, usage) = self.complete(&self.build_condense_request(messages)).await?;
        info!("Condensed {} messages into {} chars", messages.len(), text.len());
        let summary = Message::agent_text(text.trim());
        Ok(vec![match usage {
            Some(u) => summary.with_usage(u),
            None => summary,
        }])
    }

    async fn consolidate_span(
        &self,
        messages: &[Message],
        existing: Option<&MemoryRecord>,
    ) -> Result<MemoryRecord> {
        if messages.is_empty() {
            return Err(Error::EmptyInput);
        }
        debug!(
            "Consolidating {} messages (existing memory: {})",
            messages.len(),
            existing.is_some_and(|m| !m.is_empty())
        );
        let (text, _) = self
            .complete(&self.build_consolidate_request(messages, existing))
            .await?;
        let memory = parse_memory(&text)?;
        info!(
            "Consolidated memory: {} context item(s), {} subject(s)",
            memory.user_context.len(),
            memory.discussed_subjects.len()
        );
        Ok(memory)
    }
}

impl Summarizer for LlmSummarizer {
    fn condense<'a>(&'a self, messages: &'a [Message]) -> SummaryFuture<'a, Vec<Message>> {
        Box::pin(async move { self.condense_span(messages).await.map_err(Error::summarizer) })
    }

    fn consolidate<'a>(
        &'a self,
        messages: &'a [Message],
        existing: Option<&'a MemoryRecord>,
    ) -> SummaryFuture<'a, MemoryRecord> {
        Box::pin(async move {
            self.consolidate_span(messages, existing)
                .await
                .map_err(Error::summarizer)
        })
    }
}

/// Parse and schema-validate a structured memory response.
pub fn parse_memory(text: &str) -> Result<MemoryRecord> {
    let body = strip_code_fence(text);
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedOutput(format!("memory is not valid JSON: {e}")))?;

    let schema = crate::json_schema_for::<MemoryRecord>();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| Error::MalformedOutput(format!("invalid memory schema: {e}")))?;
    let errors: Vec<String> = validator
        .iter_errors(&value)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();
    if !errors.is_empty() {
        warn!("Memory response failed schema validation: {}", errors.join("; "));
        return Err(Error::MalformedOutput(format!(
            "memory does not match schema: {}",
            errors.join("; ")
        )));
    }

    serde_json::from_value(value).map_err(|e| Error::MalformedOutput(e.to_string()))
}

/// Some models wrap JSON in a markdown code fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DiscussedSubject;

    fn summarizer() -> LlmSummarizer {
        let client = OpenRouterClient::new("test-key")
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/unreachable");
        LlmSummarizer::new(Arc::new(client), SummarizerConfig::default())
    }

    #[test]
    fn parses_valid_memory() {
        let memory = parse_memory(
            r#"{"user_context": ["Data engineer"], "discussed_subjects": [{"subject": "OOP", "summary": "Classes."}]}"#,
        )
        .unwrap();
        assert_eq!(memory.user_context, vec!["Data engineer"]);
        assert_eq!(
            memory.discussed_subjects,
            vec![DiscussedSubject::new("OOP", "Classes.")]
        );
    }

    #[test]
    fn parses_fenced_memory() {
        let text = "```json\n{\"user_context\": [], \"discussed_subjects\": []}\n```";
        assert!(parse_memory(text).unwrap().is_empty());
    }

    #[test]
    fn rejects_output_that_breaks_the_schema() {
        let err = parse_memory(r#"{"user_context": "Data engineer"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)), "{err:?}");
        assert!(err.to_string().contains("does not match schema"));

        let err = parse_memory("Sure! Here is the memory:").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn consolidate_request_carries_schema_and_existing_memory() {
        let existing = MemoryRecord {
            user_context: vec!["Likes Rust".into()],
            discussed_subjects: vec![],
        };
        let req = summarizer().build_consolidate_request(
            &[Message::user_prompt("hi"), Message::agent_text("hello")],
            Some(&existing),
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(
            json["response_format"]["json_schema"]["name"],
            "conversation_memory"
        );
        let user = json["messages"][1]["content"].as_str().unwrap();
        assert!(user.starts_with("=== EXISTING MEMORY ===\n### User Context:\n- Likes Rust"));
        assert!(user.contains("[user]: hi"));
    }

    #[test]
    fn condense_request_is_plain_text() {
        let req = summarizer().build_condense_request(&[Message::user_prompt("hi")]);
        assert!(req.response_format.is_none());
        assert_eq!(req.model.as_deref(), Some(DEFAULT_SUMMARY_MODEL));
    }

    #[tokio::test]
    async fn empty_input_fails_without_a_request() {
        let s = summarizer();
        let err = s.condense(&[]).await.unwrap_err();
        assert!(err.is_summarizer_failure());
        assert!(err.to_string().contains("empty message sequence"));

        let err = s.consolidate(&[], None).await.unwrap_err();
        assert!(err.is_summarizer_failure());
        assert_eq!(s.cost().total_tokens(), 0);
    }
}
