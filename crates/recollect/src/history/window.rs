use tracing::{debug, info};

use super::{HistoryPolicy, PolicyDecision, PolicyFuture, PolicyOutcome};
use crate::message::is_safe_cut;
use crate::{History, MemoryRecord};

/// Keeps only the most recent `keep` messages. Never summarizes.
#[derive(Debug, Clone, Copy)]
pub struct RecentWindow {
    keep: usize,
}

impl RecentWindow {
    /// A window of `keep` messages. A window of zero is treated as one so the
    /// policy can never empty the history.
    pub fn new(keep: usize) -> Self {
        Self { keep: keep.max(1) }
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Synchronous core of [`HistoryPolicy::apply`].
    pub fn trim(&self, mut history: History) -> PolicyOutcome {
        if history.len() <= self.keep {
            return PolicyOutcome::unchanged(history);
        }

        let boundary = history.len() - self.keep;
        if !is_safe_cut(&history, boundary) {
            debug!("Window trim deferred: cut at {boundary} would split a tool call");
            return PolicyOutcome::deferred(history, boundary);
        }

        history.drain(..boundary);
        info!("Window trimmed {boundary} message(s), kept {}", history.len());
        PolicyOutcome {
            history,
            memory: None,
            decision: PolicyDecision::Trimmed { removed: boundary },
        }
    }
}

impl HistoryPolicy for RecentWindow {
    fn name(&self) -> &str {
        "window"
    }

    fn apply<'a>(&'a self, history: History, _memory: Option<&'a MemoryRecord>) -> PolicyFuture<'a> {
        Box::pin(async move { self.trim(history) })
    }
}
