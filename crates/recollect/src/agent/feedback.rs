use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::info;

use super::{Agent, AgentFuture, AgentRequest};
use crate::events::{ConversationEvent, EventHandler};

/// Default annotation name.
pub const DEFAULT_FEEDBACK_NAME: &str = "helpfulness";

/// One feedback annotation, keyed by the invocation's trace id.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub trace_id: String,
    pub name: String,
    pub score: f64,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Wraps an agent and records a feedback annotation after every successful
/// invocation. Failed invocations are passed through without a record.
pub struct FeedbackRecorder<A: Agent> {
    inner: A,
    name: String,
    score: f64,
    comment: Option<String>,
    records: Mutex<Vec<FeedbackRecord>>,
}

impl<A: Agent> FeedbackRecorder<A> {
    pub fn new(inner: A, score: f64) -> Self {
        Self {
            inner,
            name: DEFAULT_FEEDBACK_NAME.into(),
            score,
            comment: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Every annotation recorded so far, oldest first.
    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, trace_id: &str) -> FeedbackRecord {
        let record = FeedbackRecord {
            trace_id: trace_id.to_string(),
            name: self.name.clone(),
            score: self.score,
            comment: self.comment.clone(),
            recorded_at: Utc::now(),
        };
        info!(
            "Feedback recorded: trace_id={trace_id}, {}={}",
            record.name, record.score
        );
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        record
    }
}

impl<A: Agent> Agent for FeedbackRecorder<A> {
    fn invoke<'a>(
        &'a self,
        request: AgentRequest<'a>,
        events: &'a dyn EventHandler,
    ) -> AgentFuture<'a> {
        Box::pin(async move {
            let turn = self.inner.invoke(request, events).await?;
            let record = self.record(&turn.trace_id);
            events.on_event(&ConversationEvent::FeedbackRecorded {
                trace_id: &record.trace_id,
                name: &record.name,
                score: record.score,
            });
            Ok(turn)
        })
    }
}
