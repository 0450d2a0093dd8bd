//! Terminal chat with managed conversation history.
//!
//! `recollect-chat` wires the `recollect` conversation loop to a terminal:
//! user messages come from standard input (or a script file), answers are
//! streamed to standard output, and the configured history policy keeps the
//! conversation within budget.
//!
//! ```sh
//! # Consolidate into memory every 5000 recorded tokens (default)
//! recollect-chat --user-name Ada
//!
//! # Condense the older half past 16 messages, replaying a fixed script
//! recollect-chat --policy halves --threshold 16 --script prompts.txt
//! ```

pub mod config;
pub mod display;
pub mod input;
pub mod prompt;

pub use config::{ChatConfig, PolicyKind};
pub use display::TerminalHandler;
pub use input::{StdinInput, load_script};
pub use prompt::default_instructions;
