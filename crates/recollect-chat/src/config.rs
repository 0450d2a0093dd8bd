//! Chat session configuration with sensible defaults.
//!
//! [`ChatConfig`] holds everything the binary needs and converts it into
//! `recollect` types: the history policy, the tool set, and the agent and
//! summarizer configs.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use recollect::DEFAULT_MODEL;
use recollect::agent::AgentConfig;
use recollect::api::RetryConfig;
use recollect::history::{
    CountThreshold, HistoryPolicy, Passthrough, RecentWindow, TokenCounting, TokenThreshold,
};
use recollect::summarizer::{Summarizer, SummarizerConfig};
use recollect::summarizer::llm::DEFAULT_SUMMARY_MODEL;
use recollect::tools::{ToolSet, default_tools};

use crate::prompt::default_instructions;

/// Which history policy runs before each agent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    /// Keep the full history.
    None,
    /// Keep the most recent `--window` messages.
    Window,
    /// Consolidate into memory once `--token-limit` recorded tokens are reached.
    Tokens,
    /// Condense the older half once the history exceeds `--threshold` messages.
    Halves,
}

/// Configuration for a chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Default: `tokens`.
    pub policy: PolicyKind,
    /// Messages kept by the window policy. Default: `10`.
    pub window: usize,
    /// Token limit for the tokens policy. Default: `5000`.
    pub token_limit: u64,
    /// Message threshold for the halves policy. Default: `16`.
    pub threshold: usize,
    /// Fall back to a character estimate when no usage was recorded.
    pub estimate_tokens: bool,
    pub model: String,
    pub summary_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_rounds: u32,
    pub streaming: bool,
    /// Retries for transient API errors, for agent and summarizer alike.
    pub retries: u32,
    /// Upper bound on one summarizer call. `None` waits indefinitely.
    pub summary_timeout: Option<Duration>,
    pub instructions: String,
    pub user_name: Option<String>,
    pub tools: bool,
    /// Score recorded for every answered turn, when set.
    pub feedback_score: Option<f64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Tokens,
            window: 10,
            token_limit: 5000,
            threshold: 16,
            estimate_tokens: false,
            model: DEFAULT_MODEL.to_string(),
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_rounds: 8,
            streaming: true,
            retries: 2,
            summary_timeout: Some(Duration::from_secs(60)),
            instructions: default_instructions(),
            user_name: None,
            tools: true,
            feedback_score: None,
        }
    }
}

impl ChatConfig {
    /// Build the configured history policy around `summarizer`.
    pub fn build_policy(&self, summarizer: Arc<dyn Summarizer>) -> Box<dyn HistoryPolicy> {
        match self.policy {
            PolicyKind::None => Box::new(Passthrough),
            PolicyKind::Window => Box::new(RecentWindow::new(self.window)),
            PolicyKind::Tokens => {
                let counting = if self.estimate_tokens {
                    TokenCounting::RecordedOrEstimated
                } else {
                    TokenCounting::Recorded
                };
                Box::new(
                    TokenThreshold::new(self.token_limit, summarizer)
                        .with_counting(counting)
                        .with_timeout(self.summary_timeout),
                )
            }
            PolicyKind::Halves => Box::new(
                CountThreshold::new(self.threshold, summarizer).with_timeout(self.summary_timeout),
            ),
        }
    }

    /// The built-in tools, or none with `tools = false`.
    pub fn build_tool_set(&self) -> ToolSet {
        if self.tools {
            default_tools()
        } else {
            ToolSet::new()
        }
    }

    pub fn build_agent_config(&self) -> AgentConfig {
        AgentConfig::default()
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_max_rounds(self.max_rounds)
            .with_streaming(self.streaming)
            .with_retry(RetryConfig::with_retries(self.retries))
    }

    pub fn build_summarizer_config(&self) -> SummarizerConfig {
        SummarizerConfig::default()
            .with_model(self.summary_model.clone())
            .with_retry(RetryConfig::with_retries(self.retries))
    }
}
