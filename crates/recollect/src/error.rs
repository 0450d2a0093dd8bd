//! Error type shared by every layer of the crate.
//!
//! Provider, parsing and configuration failures are flat variants. The two
//! failure categories the conversation loop reacts to are wrappers around an
//! underlying cause:
//!
//! - [`Error::Summarizer`]: a summarizer call failed. History policies
//!   recover from it locally by returning the history untouched.
//! - [`Error::Agent`]: the agent invocation failed. The conversation loop
//!   reports it and keeps reading input.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// A stream broke after part of the answer had already been shown.
    /// Never retried, since a new request would repeat that text.
    #[error("stream interrupted after partial output: {0}")]
    StreamInterrupted(Box<Error>),

    /// The provider answered with a non-success status.
    #[error("OpenRouter API HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// A response body or stream chunk could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The model returned neither text nor tool calls.
    #[error("empty response from model")]
    EmptyResponse,

    /// The model answered, but not in the shape that was asked for.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// A summarizer was handed nothing to summarize.
    #[error("cannot summarize an empty message sequence")]
    EmptyInput,

    /// An external call did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The tool loop hit its round limit without a final text answer.
    #[error("round limit ({0}) reached without a final answer")]
    RoundLimit(u32),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading user input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A summarizer invocation failed.
    #[error("summarizer failed: {0}")]
    Summarizer(#[source] Box<Error>),

    /// An agent invocation failed.
    #[error("agent invocation failed: {0}")]
    Agent(#[source] Box<Error>),
}

impl Error {
    /// Wrap an error as a summarizer failure. Already-wrapped errors are
    /// returned as-is.
    pub fn summarizer(cause: Error) -> Self {
        match cause {
            Error::Summarizer(_) => cause,
            other => Error::Summarizer(Box::new(other)),
        }
    }

    /// Wrap an error as an agent invocation failure. Already-wrapped errors
    /// are returned as-is.
    pub fn agent(cause: Error) -> Self {
        match cause {
            Error::Agent(_) => cause,
            other => Error::Agent(Box::new(other)),
        }
    }

    /// Whether this error is a summarizer failure.
    pub fn is_summarizer_failure(&self) -> bool {
        matches!(self, Error::Summarizer(_))
    }

    /// Whether this error is an agent invocation failure.
    pub fn is_agent_failure(&self) -> bool {
        matches!(self, Error::Agent(_))
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Rate limits, 5xx responses, network errors and timeouts are
    /// transient. Client errors (400, 401, 403, 404, 422) never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Error::Request(msg) => crate::api::retry::is_transient_message(msg),
            Error::Timeout(_) => true,
            Error::Summarizer(inner) | Error::Agent(inner) => inner.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrappers_do_not_double_wrap() {
        let err = Error::summarizer(Error::summarizer(Error::EmptyResponse));
        match err {
            Error::Summarizer(inner) => assert!(matches!(*inner, Error::EmptyResponse)),
            other => panic!("unexpected: {other:?}"),
        }

        let err = Error::agent(Error::agent(Error::RoundLimit(3)));
        assert!(err.is_agent_failure());
        assert!(err.to_string().contains("round limit (3)"));
    }

    #[test]
    fn transient_classification() {
        assert!(
            Error::Api {
                status: 429,
                body: "slow down".into()
            }
            .is_transient()
        );
        assert!(
            Error::Api {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !Error::Api {
                status: 401,
                body: "unauthorized".into()
            }
            .is_transient()
        );
        assert!(Error::Request("connection reset by peer".into()).is_transient());
        assert!(Error::summarizer(Error::Timeout(Duration::from_secs(1))).is_transient());
        assert!(!Error::MalformedOutput("not json".into()).is_transient());
        let interrupted = Error::StreamInterrupted(Box::new(Error::Request(
            "connection reset by peer".into(),
        )));
        assert!(!interrupted.is_transient());
        assert!(!Error::agent(interrupted).is_transient());
    }

    #[test]
    fn display_includes_cause() {
        let err = Error::summarizer(Error::MalformedOutput("missing field".into()));
        assert_eq!(
            err.to_string(),
            "summarizer failed: malformed model output: missing field"
        );
    }
}
