use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{HistoryPolicy, PolicyDecision, PolicyFuture, PolicyOutcome, bounded};
use crate::message::{is_safe_cut, total_recorded_tokens};
use crate::summarizer::Summarizer;
use crate::{History, MemoryRecord, Message};

/// How [`TokenThreshold`] sizes the history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenCounting {
    /// Sum of provider-recorded usage. Messages without usage count as zero.
    #[default]
    Recorded,
    /// Recorded usage, or the character estimate over every message when
    /// the provider recorded nothing at all.
    RecordedOrEstimated,
}

impl TokenCounting {
    pub fn count(&self, history: &[Message]) -> u64 {
        let recorded = total_recorded_tokens(history);
        match self {
            TokenCounting::Recorded => recorded,
            TokenCounting::RecordedOrEstimated if recorded > 0 => recorded,
            TokenCounting::RecordedOrEstimated => {
                history.iter().map(Message::estimated_tokens).sum()
            }
        }
    }
}

/// Consolidates the whole history into long-term memory once its token
/// count reaches `limit`, keeping only the newest message.
///
/// The kept message loses its recorded usage: that count measured the
/// context now folded into memory, so counting restarts from zero.
pub struct TokenThreshold {
    limit: u64,
    summarizer: Arc<dyn Summarizer>,
    counting: TokenCounting,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for TokenThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenThreshold")
            .field("limit", &self.limit)
            .field("counting", &self.counting)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TokenThreshold {
    pub fn new(limit: u64, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            limit,
            summarizer,
            counting: TokenCounting::default(),
            timeout: None,
        }
    }

    pub fn with_counting(mut self, counting: TokenCounting) -> Self {
        self.counting = counting;
        self
    }

    /// Bound each summarizer call. Expiry counts as a summarizer failure.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    async fn run(&self, history: History, memory: Option<&MemoryRecord>) -> PolicyOutcome {
        let len = history.len();
        if len == 0 {
            return PolicyOutcome::unchanged(history);
        }

        let total = self.counting.count(&history);
        if total < self.limit {
            debug!("History at {total}/{} tokens, below limit", self.limit);
            return PolicyOutcome::unchanged(history);
        }

        // The newest message is kept, so the cut sits just before it.
        let boundary = len - 1;
        if !is_safe_cut(&history, boundary) {
            info!(
                "History at {total}/{} tokens but ends in a tool return; consolidation deferred",
                self.limit
            );
            return PolicyOutcome::deferred(history, boundary);
        }

        info!(
            "History at {total}/{} tokens; consolidating {len} message(s) into memory",
            self.limit
        );
        match bounded(self.timeout, self.summarizer.consolidate(&history, memory)).await {
            Ok(new_memory) => {
                let mut history = history;
                let kept: History = history
                    .split_off(boundary)
                    .into_iter()
                    .map(Message::without_usage)
                    .collect();
                PolicyOutcome {
                    history: kept,
                    memory: Some(new_memory),
                    decision: PolicyDecision::Consolidated {
                        summarized: len,
                        kept: 1,
                    },
                }
            }
            Err(e) => {
                warn!("Memory consolidation failed, keeping full history: {e}");
                PolicyOutcome::failed(history, e)
            }
        }
    }
}

impl HistoryPolicy for TokenThreshold {
    fn name(&self) -> &str {
        "tokens"
    }

    fn apply<'a>(&'a self, history: History, memory: Option<&'a MemoryRecord>) -> PolicyFuture<'a> {
        Box::pin(self.run(history, memory))
    }

    fn token_limit(&self) -> Option<u64> {
        Some(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenUsage;
    use crate::history::test_support::{StubSummarizer, chat};
    use crate::memory::DiscussedSubject;

    fn policy(limit: u64, stub: &Arc<StubSummarizer>) -> TokenThreshold {
        TokenThreshold::new(limit, stub.clone())
    }

    #[tokio::test]
    async fn one_below_limit_is_unchanged() {
        let stub = Arc::new(StubSummarizer::default());
        // 4 replies x 1000 tokens = 4000.
        let history = chat(4, 1000);
        let outcome = policy(4001, &stub).apply(history.clone(), None).await;
        assert_eq!(outcome.history, history);
        assert!(outcome.memory.is_none());
        assert!(matches!(outcome.decision, PolicyDecision::Unchanged));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn at_limit_consolidates_into_last_message() {
        let stub = Arc::new(StubSummarizer::default());
        let history = chat(5, 1000);
        let last = history.last().cloned().unwrap();

        let outcome = policy(5000, &stub).apply(history, None).await;
        assert_eq!(stub.call_count(), 1);
        assert_eq!(*stub.seen.lock().unwrap(), vec![10]);
        assert_eq!(outcome.history, vec![last.without_usage()]);
        assert!(matches!(
            outcome.decision,
            PolicyDecision::Consolidated {
                summarized: 10,
                kept: 1
            }
        ));
        let memory = outcome.memory.unwrap();
        assert_eq!(memory.discussed_subjects.len(), 1);
    }

    #[tokio::test]
    async fn count_restarts_after_consolidation() {
        let stub = Arc::new(StubSummarizer::default());
        let limit = 5000;
        // A single reply already over the limit.
        let history = chat(1, 6000);

        let first = policy(limit, &stub).apply(history, None).await;
        assert_eq!(stub.call_count(), 1);
        assert_eq!(first.history.len(), 1);
        assert_eq!(TokenCounting::Recorded.count(&first.history), 0);

        // The next turn only counts its own usage and stays below the limit.
        let mut next = first.history;
        next.extend(chat(1, 300));
        assert_eq!(TokenCounting::Recorded.count(&next), 300);

        let second = policy(limit, &stub)
            .apply(next.clone(), first.memory.as_ref())
            .await;
        assert_eq!(second.history, next);
        assert!(matches!(second.decision, PolicyDecision::Unchanged));
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn existing_memory_is_passed_to_the_summarizer() {
        let stub = Arc::new(StubSummarizer::default());
        let existing = MemoryRecord {
            user_context: vec!["Data engineer".into()],
            discussed_subjects: vec![DiscussedSubject::new("segment 1", "earlier")],
        };
        let outcome = policy(10, &stub).apply(chat(1, 20), Some(&existing)).await;
        let memory = outcome.memory.unwrap();
        assert_eq!(memory.user_context, vec!["Data engineer"]);
        assert_eq!(memory.discussed_subjects.len(), 2);
    }

    #[tokio::test]
    async fn tool_return_at_end_defers() {
        let stub = Arc::new(StubSummarizer::default());
        let mut history = chat(5, 1000);
        history.push(Message::user_prompt("what time is it?"));
        history.push(
            Message::tool_call("c1", "check_datetime", "{}").with_usage(TokenUsage::new(50, 5)),
        );
        history.push(Message::tool_return("c1", "check_datetime", "2025-01-01T00:00:00Z"));

        let outcome = policy(100, &stub).apply(history.clone(), None).await;
        assert_eq!(outcome.history, history);
        assert!(matches!(
            outcome.decision,
            PolicyDecision::Deferred { boundary: 12 }
        ));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn summarizer_failure_returns_original_history() {
        let stub = Arc::new(StubSummarizer::failing());
        let history = chat(5, 1000);
        let outcome = policy(5000, &stub).apply(history.clone(), None).await;
        assert_eq!(outcome.history, history);
        assert!(outcome.memory.is_none());
        match outcome.decision {
            PolicyDecision::Failed { error } => assert!(error.is_summarizer_failure()),
            other => panic!("unexpected decision: {other:?}"),
        }
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let stub = Arc::new(StubSummarizer::slow(Duration::from_secs(5)));
        let history = chat(5, 1000);
        let outcome = policy(5000, &stub)
            .with_timeout(Some(Duration::from_millis(10)))
            .apply(history.clone(), None)
            .await;
        assert_eq!(outcome.history, history);
        assert!(matches!(outcome.decision, PolicyDecision::Failed { .. }));
    }

    #[tokio::test]
    async fn empty_history_is_unchanged_even_with_zero_limit() {
        let stub = Arc::new(StubSummarizer::default());
        let outcome = policy(0, &stub).apply(Vec::new(), None).await;
        assert!(outcome.history.is_empty());
        assert!(matches!(outcome.decision, PolicyDecision::Unchanged));
        assert_eq!(stub.call_count(), 0);
    }

    #[test]
    fn estimate_fallback_only_without_recorded_usage() {
        let unrecorded = vec![
            Message::user_prompt("a".repeat(35)),
            Message::agent_text("b".repeat(70)),
        ];
        assert_eq!(TokenCounting::Recorded.count(&unrecorded), 0);
        assert_eq!(TokenCounting::RecordedOrEstimated.count(&unrecorded), 30);

        let recorded = chat(2, 100);
        assert_eq!(TokenCounting::RecordedOrEstimated.count(&recorded), 200);
    }

    #[test]
    fn reports_its_limit() {
        let stub = Arc::new(StubSummarizer::default());
        assert_eq!(policy(5000, &stub).token_limit(), Some(5000));
    }
}
