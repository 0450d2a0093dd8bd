//! History policies: what happens to the conversation history before each
//! agent call.
//!
//! A [`HistoryPolicy`] receives the history by value and hands back a
//! [`PolicyOutcome`]: the history to use from now on, an optional new
//! [`MemoryRecord`], and a [`PolicyDecision`] saying what was done. Every
//! policy follows the same rules:
//!
//! - a tool call is never separated from its return (see
//!   [`is_safe_cut`](crate::message::is_safe_cut)); when the natural cut
//!   would split a pair, the policy defers and returns the history as is;
//! - the summarizer is called at most once per invocation;
//! - a summarizer failure is never fatal. The original history comes back
//!   untouched with a [`PolicyDecision::Failed`].
//!
//! Available policies:
//!
//! | Policy | Trigger | Result |
//! |--------|---------|--------|
//! | [`Passthrough`] | never | unchanged |
//! | [`RecentWindow`] | more than N messages | last N messages |
//! | [`TokenThreshold`] | recorded tokens reach the limit | last message + new memory |
//! | [`CountThreshold`] | more than N messages | summary + most recent half |

mod halves;
mod tokens;
mod window;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use halves::CountThreshold;
pub use tokens::{TokenCounting, TokenThreshold};
pub use window::RecentWindow;

use crate::{Error, History, MemoryRecord, Result};

/// Boxed future returned by [`HistoryPolicy::apply`].
pub type PolicyFuture<'a> = Pin<Box<dyn Future<Output = PolicyOutcome> + Send + 'a>>;

/// What a policy did to the history.
#[derive(Debug)]
pub enum PolicyDecision {
    /// Below the policy's trigger; nothing to do.
    Unchanged,
    /// Above the trigger, but cutting at `boundary` would split a tool call
    /// from its return. Retried on the next turn.
    Deferred { boundary: usize },
    /// The oldest `removed` messages were dropped.
    Trimmed { removed: usize },
    /// `summarized` messages went to the summarizer; `kept` messages were
    /// retained verbatim.
    Consolidated { summarized: usize, kept: usize },
    /// The summarizer failed; the history was returned untouched.
    Failed { error: Error },
}

impl PolicyDecision {
    /// Whether the returned history differs from the input.
    pub fn changed_history(&self) -> bool {
        matches!(
            self,
            PolicyDecision::Trimmed { .. } | PolicyDecision::Consolidated { .. }
        )
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyDecision::Unchanged => write!(f, "unchanged"),
            PolicyDecision::Deferred { boundary } => {
                write!(f, "deferred (cut at {boundary} splits a tool call)")
            }
            PolicyDecision::Trimmed { removed } => write!(f, "trimmed {removed} message(s)"),
            PolicyDecision::Consolidated { summarized, kept } => {
                write!(f, "consolidated {summarized} message(s), kept {kept}")
            }
            PolicyDecision::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Result of one policy invocation.
#[derive(Debug)]
pub struct PolicyOutcome {
    pub history: History,
    /// Replacement memory, when the policy produced one. `None` leaves the
    /// caller's memory as it was.
    pub memory: Option<MemoryRecord>,
    pub decision: PolicyDecision,
}

impl PolicyOutcome {
    pub fn unchanged(history: History) -> Self {
        Self {
            history,
            memory: None,
            decision: PolicyDecision::Unchanged,
        }
    }

    pub fn deferred(history: History, boundary: usize) -> Self {
        Self {
            history,
            memory: None,
            decision: PolicyDecision::Deferred { boundary },
        }
    }

    pub fn failed(history: History, error: Error) -> Self {
        Self {
            history,
            memory: None,
            decision: PolicyDecision::Failed { error },
        }
    }
}

/// Strategy run on the history before every agent call.
pub trait HistoryPolicy: Send + Sync {
    /// Short identifier used in logs and events.
    fn name(&self) -> &str;

    /// Inspect `history` and return what should replace it. `memory` is the
    /// caller's current long-term memory, if any.
    fn apply<'a>(&'a self, history: History, memory: Option<&'a MemoryRecord>) -> PolicyFuture<'a>;

    /// Token budget, for policies that have one.
    fn token_limit(&self) -> Option<u64> {
        None
    }
}

impl<P: HistoryPolicy + ?Sized> HistoryPolicy for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply<'a>(&'a self, history: History, memory: Option<&'a MemoryRecord>) -> PolicyFuture<'a> {
        (**self).apply(history, memory)
    }

    fn token_limit(&self) -> Option<u64> {
        (**self).token_limit()
    }
}

/// Leaves the history alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl HistoryPolicy for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn apply<'a>(&'a self, history: History, _memory: Option<&'a MemoryRecord>) -> PolicyFuture<'a> {
        Box::pin(async move { PolicyOutcome::unchanged(history) })
    }
}

/// Await a summarizer call, bounded by `limit`. Every error comes back
/// wrapped as a summarizer failure.
pub(crate) async fn bounded<T>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(r) => r,
            Err(_) => Err(Error::Timeout(limit)),
        },
        None => call.await,
    };
    result.map_err(Error::summarizer)
}
