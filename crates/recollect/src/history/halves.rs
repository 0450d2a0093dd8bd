use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{HistoryPolicy, PolicyDecision, PolicyFuture, PolicyOutcome, bounded};
use crate::message::is_safe_cut;
use crate::summarizer::Summarizer;
use crate::{History, MemoryRecord};

/// Once the history grows past `threshold` messages, condenses everything
/// but the most recent half into a summary.
///
/// The recent half is the last `max(threshold / 2, 1)` messages. Everything
/// older goes to the summarizer, so nothing is dropped without being
/// summarized. The result is `summary ++ recent`.
pub struct CountThreshold {
    threshold: usize,
    summarizer: Arc<dyn Summarizer>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for CountThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountThreshold")
            .field("threshold", &self.threshold)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CountThreshold {
    pub fn new(threshold: usize, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            threshold,
            summarizer,
            timeout: None,
        }
    }

    /// Bound each summarizer call. Expiry counts as a summarizer failure.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of most recent messages kept verbatim.
    pub fn recent_len(&self) -> usize {
        (self.threshold / 2).max(1)
    }

    async fn run(&self, mut history: History) -> PolicyOutcome {
        let len = history.len();
        if len <= self.threshold {
            return PolicyOutcome::unchanged(history);
        }

        let keep = self.recent_len().min(len);
        let boundary = len - keep;
        if boundary == 0 {
            return PolicyOutcome::unchanged(history);
        }
        if !is_safe_cut(&history, boundary) {
            info!(
                "History at {len}/{} messages; cut at {boundary} would split a tool call, \
                 summarization deferred",
                self.threshold
            );
            return PolicyOutcome::deferred(history, boundary);
        }

        info!("History at {len}/{} messages; condensing the oldest {boundary}", self.threshold);
        let older = history.get(..boundary).unwrap_or_default();
        match bounded(self.timeout, self.summarizer.condense(older)).await {
            Ok(mut summary) => {
                let recent = history.split_off(boundary);
                summary.extend(recent);
                PolicyOutcome {
                    history: summary,
                    memory: None,
                    decision: PolicyDecision::Consolidated {
                        summarized: boundary,
                        kept: keep,
                    },
                }
            }
            Err(e) => {
                warn!("History summarization failed, keeping full history: {e}");
                PolicyOutcome::failed(history, e)
            }
        }
    }
}

impl HistoryPolicy for CountThreshold {
    fn name(&self) -> &str {
        "halves"
    }

    fn apply<'a>(&'a self, history: History, _memory: Option<&'a MemoryRecord>) -> PolicyFuture<'a> {
        Box::pin(self.run(history))
    }
}
