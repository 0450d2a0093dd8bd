//! Correlation IDs and cost tracking for a conversation.
//!
//! Every agent invocation gets a `trace_id` that feedback annotations and
//! log lines can refer to. [`CostTracker`] accumulates token usage across
//! agent and summarizer calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::TokenUsage;

/// Generate a unique trace ID for one agent invocation.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn estimate_cost(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (usage.output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self::new(3.0, 15.0)
    }
}

/// Approximate pricing for a model by name.
///
/// Matches on the segment after the last `/` so organisation prefixes in
/// paths like `"my-org/custom-sonnet"` do not cause false positives.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    if name.contains("opus") {
        ModelPricing::new(15.0, 75.0)
    } else if name.contains("sonnet") {
        ModelPricing::new(3.0, 15.0)
    } else if name.contains("haiku") {
        ModelPricing::new(0.25, 1.25)
    } else if name.contains("4o-mini") || name.contains("4.1-mini") {
        ModelPricing::new(0.15, 0.60)
    } else if name.contains("gpt-4") {
        ModelPricing::new(2.50, 10.0)
    } else if name.contains("gemini") && name.contains("flash") {
        ModelPricing::new(0.075, 0.30)
    } else if name.contains("gemini") {
        ModelPricing::new(1.25, 5.0)
    } else if name.contains("deepseek") {
        ModelPricing::new(0.27, 1.10)
    } else {
        ModelPricing::default()
    }
}

/// Cumulative token and cost totals for a conversation.
#[derive(Debug, Default, Clone)]
pub struct CostTracker {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response's usage, priced for `model`.
    pub fn record(&mut self, model: &str, usage: TokenUsage) {
        self.total_prompt_tokens += usage.input_tokens as u64;
        self.total_completion_tokens += usage.output_tokens as u64;
        self.estimated_cost_usd += pricing_for_model(model).estimate_cost(usage);
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens + self.total_completion_tokens
    }

    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion = {} total, est. cost: ${:.4}",
            self.total_prompt_tokens,
            self.total_completion_tokens,
            self.total_tokens(),
            self.estimated_cost_usd,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        let id1 = generate_trace_id();
        let id2 = generate_trace_id();
        assert_ne!(id1, id2);
        assert!(id1.starts_with("tr-"));
    }

    #[test]
    fn cost_estimation() {
        let pricing = ModelPricing::new(3.0, 15.0);
        let cost = pricing.estimate_cost(TokenUsage::new(1_000_000, 100_000));
        assert!((cost - 4.5).abs() < 0.01);
    }

    #[test]
    fn pricing_ignores_org_prefix() {
        assert!(pricing_for_model("anthropic/claude-opus-4").input_per_million > 10.0);
        assert!(pricing_for_model("openai/gpt-4o-mini").input_per_million < 1.0);
        assert_eq!(
            pricing_for_model("haiku-labs/some-model"),
            ModelPricing::default()
        );
    }

    #[test]
    fn tracker_accumulates_and_summarizes() {
        let mut tracker = CostTracker::new();
        tracker.record("openai/gpt-4o-mini", TokenUsage::new(1000, 500));
        tracker.record("openai/gpt-4o-mini", TokenUsage::new(2000, 1000));
        assert_eq!(tracker.total_prompt_tokens, 3000);
        assert_eq!(tracker.total_completion_tokens, 1500);
        assert_eq!(tracker.total_tokens(), 4500);
        assert!(tracker.estimated_cost_usd > 0.0);
        assert!(tracker.summary().contains("4500 total"));
    }
}
