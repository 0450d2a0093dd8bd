//! Structured long-term conversation memory.
//!
//! A [`MemoryRecord`] is what token-threshold consolidation produces instead
//! of replacement messages. It lives outside the history, owned by the
//! conversation loop, and is re-injected into the agent's instructions as a
//! markdown section on every turn.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Heading used when the memory is rendered into agent instructions.
pub const MEMORY_SECTION_HEADING: &str = "Conversation Memory";

/// A subject or theme that was discussed in the conversation.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct DiscussedSubject {
    /// Name or title of the subject/topic that was discussed.
    pub subject: String,
    /// Detailed, compact summary of how this subject was discussed: key
    /// definitions, steps, examples, decisions, constraints, caveats, and
    /// outcomes. Granular points without conversational filler.
    pub summary: String,
}

impl DiscussedSubject {
    pub fn new(subject: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            summary: summary.into(),
        }
    }
}

/// Consolidated memory of conversations with the user.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryRecord {
    /// Personal/professional context about the user (role, background,
    /// preferences, needs, motivations, constraints).
    pub user_context: Vec<String>,
    /// Subjects, themes, or topics discussed (concepts, problems solved,
    /// questions answered, projects mentioned).
    pub discussed_subjects: Vec<DiscussedSubject>,
}

impl MemoryRecord {
    pub fn is_empty(&self) -> bool {
        self.user_context.is_empty() && self.discussed_subjects.is_empty()
    }

    /// Render as markdown. Returns an empty string for an empty record.
    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        if !self.user_context.is_empty() {
            lines.push("### User Context:".to_string());
            lines.extend(self.user_context.iter().map(|c| format!("- {c}")));
        }

        if !self.discussed_subjects.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push("### Discussed Subjects:".to_string());
            lines.extend(
                self.discussed_subjects
                    .iter()
                    .map(|s| format!("- **{}**: {}", s.subject, s.summary)),
            );
        }

        lines.join("\n")
    }
}
