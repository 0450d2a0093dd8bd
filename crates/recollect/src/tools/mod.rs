//! Tools the agent can call during a turn.
//!
//! - [`core`]: the [`Tool`] trait, [`ToolSet`] dispatch and [`FnTool`].
//! - [`calculator`]: arithmetic expression evaluator.
//! - [`clock`]: current UTC date and time.

pub mod calculator;
pub mod clock;
pub mod core;

pub use calculator::Calculator;
pub use clock::check_datetime_tool;
pub use self::core::{
    DEFAULT_MAX_RESULT_BYTES, FnTool, Tool, ToolFuture, ToolSet, parse_tool_args,
    truncate_result, validate_tool_arguments,
};

/// The built-in tools: `calculator` and `check_datetime`.
pub fn default_tools() -> ToolSet {
    ToolSet::new()
        .with_arg_validation(true)
        .with(Calculator)
        .with(check_datetime_tool())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tools_registers_builtins() {
        let tools = default_tools();
        assert_eq!(tools.names(), vec!["calculator", "check_datetime"]);
    }

    #[tokio::test]
    async fn builtins_validate_against_their_schemas() {
        let tools = default_tools();
        assert_eq!(
            tools.execute("calculator", r#"{"expression": "6*7"}"#).await,
            "42"
        );
        let out = tools.execute("calculator", r#"{}"#).await;
        assert!(out.contains("argument validation failed"), "{out}");
    }
}
