//! Agent instructions builder.
//!
//! [`InstructionsBuilder`] assembles the system instructions sent with
//! every agent call: a fixed preamble, the consolidated conversation memory
//! (when there is one) and the small dynamic facts the agent should know
//! about the user and the current date.

use chrono::NaiveDate;

use crate::memory::{MEMORY_SECTION_HEADING, MemoryRecord};

/// Builder for multi-section instructions.
///
/// Sections are joined with blank lines. Empty sections are skipped.
///
/// ```
/// use recollect::prompt::InstructionsBuilder;
///
/// let instructions = InstructionsBuilder::new("You are a helpful assistant.")
///     .user_name(Some("Ada"))
///     .section("Style", "Answer briefly.")
///     .section_opt("Missing", None::<String>)
///     .build();
///
/// assert!(instructions.contains("The user's name is Ada."));
/// assert!(instructions.contains("## Style"));
/// assert!(!instructions.contains("## Missing"));
/// ```
#[derive(Debug, Clone)]
pub struct InstructionsBuilder {
    sections: Vec<String>,
}

impl InstructionsBuilder {
    /// Start with a preamble included as-is.
    pub fn new(preamble: impl Into<String>) -> Self {
        let preamble = preamble.into();
        Self {
            sections: if preamble.is_empty() {
                Vec::new()
            } else {
                vec![preamble]
            },
        }
    }

    /// Append a `## heading` section. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n\n{content}"));
        }
        self
    }

    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Append raw text without a heading. Skipped if empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    /// Render the consolidated memory. An absent or empty record adds
    /// nothing.
    pub fn memory(self, memory: Option<&MemoryRecord>) -> Self {
        match memory {
            Some(m) => self.section(MEMORY_SECTION_HEADING, m.to_markdown()),
            None => self,
        }
    }

    pub fn user_name(self, name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(n) if !n.is_empty() => self.raw(format!("The user's name is {n}.")),
            _ => self,
        }
    }

    pub fn date(self, date: NaiveDate) -> Self {
        self.raw(format!("The date is {}.", date.format("%Y-%m-%d")))
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DiscussedSubject;

    #[test]
    fn preamble_only() {
        assert_eq!(InstructionsBuilder::new("Be helpful.").build(), "Be helpful.");
        assert_eq!(InstructionsBuilder::new("").build(), "");
    }

    #[test]
    fn memory_section_is_rendered_under_heading() {
        let memory = MemoryRecord {
            user_context: vec!["Data engineer".into()],
            discussed_subjects: vec![DiscussedSubject::new("Lists", "Mutable sequences.")],
        };
        let text = InstructionsBuilder::new("Base.").memory(Some(&memory)).build();
        assert!(text.starts_with("Base.\n\n## Conversation Memory\n\n### User Context:\n- Data engineer"));
        assert!(text.ends_with("- **Lists**: Mutable sequences."));
    }

    #[test]
    fn empty_memory_adds_nothing() {
        let text = InstructionsBuilder::new("Base.")
            .memory(Some(&MemoryRecord::default()))
            .memory(None)
            .build();
        assert_eq!(text, "Base.");
    }

    #[test]
    fn dynamic_facts() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let text = InstructionsBuilder::new("Base.")
            .user_name(Some("  "))
            .user_name(Some("Grace"))
            .date(date)
            .build();
        assert_eq!(
            text,
            "Base.\n\nThe user's name is Grace.\n\nThe date is 2025-01-31."
        );
    }
}
