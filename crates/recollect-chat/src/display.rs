//! Terminal rendering of conversation events.
//!
//! Answers go to stdout as they stream in. Tool activity, history policy
//! decisions and the per-turn token report go to stderr so stdout stays a
//! clean transcript.

use std::io::Write;

use recollect::events::{ConversationEvent, EventHandler};
use recollect::history::PolicyDecision;

/// Prints streamed answers and a token report after every turn.
#[derive(Debug, Default)]
pub struct TerminalHandler {
    /// Print each user message before its answer. Used for scripted runs,
    /// where nothing was typed.
    pub echo_input: bool,
}

impl TerminalHandler {
    pub fn new(echo_input: bool) -> Self {
        Self { echo_input }
    }
}

/// Token report shown after each turn.
pub fn token_report(total: u64, limit: Option<u64>) -> String {
    match limit {
        Some(limit) if limit > 0 => format!(
            "[tokens: {total} / {limit} ({:.1}% of limit)]",
            total as f64 / limit as f64 * 100.0
        ),
        _ => format!("[tokens: {total}]"),
    }
}

impl EventHandler for TerminalHandler {
    fn on_event(&self, event: &ConversationEvent<'_>) {
        match event {
            ConversationEvent::TurnStart { input, .. } if self.echo_input => {
                println!("> {input}");
            }
            ConversationEvent::PolicyApplied {
                decision, before, after, ..
            } => match decision {
                PolicyDecision::Unchanged => {}
                PolicyDecision::Failed { error } => {
                    eprintln!("[history kept at {before} messages: {error}]");
                }
                other => eprintln!("[history {other}: {before} -> {after} messages]"),
            },
            ConversationEvent::TextDelta(text) => {
                let mut stdout = std::io::stdout();
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
            ConversationEvent::ToolExecuting { name, arguments } => {
                eprintln!("\n  [{name}] {arguments}");
            }
            ConversationEvent::ToolResult { name, result, .. } => {
                let preview: String = result.chars().take(120).collect();
                eprintln!("  [{name}] -> {preview}");
            }
            ConversationEvent::TurnFinished {
                total_tokens,
                token_limit,
                ..
            } => {
                println!();
                eprintln!("{}", token_report(*total_tokens, *token_limit));
            }
            ConversationEvent::AgentFailed { error, .. } => {
                eprintln!("\nerror: {error}");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_with_and_without_limit() {
        assert_eq!(
            token_report(1250, Some(5000)),
            "[tokens: 1250 / 5000 (25.0% of limit)]"
        );
        assert_eq!(token_report(1250, None), "[tokens: 1250]");
        assert_eq!(token_report(3, Some(0)), "[tokens: 3]");
    }
}
