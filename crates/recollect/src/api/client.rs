//! Async HTTP client for the OpenRouter chat completions API.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::wire::{ChatCompletion, ChatRequest, RawChatResponse};
use crate::{Error, Result};

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Async HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) endpoint: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("endpoint", &self.endpoint)
            .field("title", &self.title)
            .finish()
    }
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_headers(api_key, "https://github.com/recollect", "recollect")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("recollect/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: OPENROUTER_URL.to_string(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn post(&self) -> reqwest::RequestBuilder {
        self.client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion> {
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}, temp={}",
            body.model.as_deref().unwrap_or("(none)"),
            body.messages.len(),
            tool_count,
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .post()
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Request(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_completion(&text)
    }
}

/// Decode a non-streaming response body.
pub(crate) fn parse_completion(text: &str) -> Result<ChatCompletion> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| Error::Parse(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(Error::Api {
            status: 200,
            body: err.message,
        });
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let choice = parsed.choices.and_then(|c| c.into_iter().next());

    Ok(match choice {
        Some(c) => {
            let tool_calls = c.message.tool_calls.unwrap_or_default();
            debug!(
                "LLM output: {} chars text, {} tool call(s)",
                c.message.content.as_ref().map_or(0, |s| s.len()),
                tool_calls.len()
            );
            ChatCompletion {
                content: c.message.content,
                tool_calls,
                usage: parsed.usage,
                finish_reason: c.finish_reason,
            }
        }
        None => {
            debug!("LLM output: empty (no choices)");
            ChatCompletion {
                usage: parsed.usage,
                ..Default::default()
            }
        }
    })
}
