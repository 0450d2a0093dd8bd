//! Tool abstraction for function-calling agents.
//!
//! The [`Tool`] trait defines the interface that every tool implements: a
//! static API definition (name, description, JSON schema) and an async
//! `execute` method. Tools are collected into a [`ToolSet`] which handles
//! dispatch, definition export, timeouts and result truncation.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::api::ToolDef;

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Default timeout for tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = String> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool that an agent can invoke via function-calling.
pub trait Tool: Send + Sync {
    /// The tool definition sent to the API.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the given raw JSON arguments string.
    ///
    /// Errors are returned as strings, not panics: the result is handed
    /// back to the model as the tool return either way.
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    fn name(&self) -> String {
        self.definition().function.name
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// A collection of tools dispatched by name.
///
/// ```ignore
/// let tools = ToolSet::new()
///     .with_arg_validation(true)
///     .with(Calculator)
///     .with_if(clock_enabled, check_datetime_tool());
/// let defs = tools.definitions();
/// ```
pub struct ToolSet {
    tools: BTreeMap<String, Box<dyn Tool>>,
    max_result_bytes: usize,
    validate_args: bool,
    timeout: Option<Duration>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("max_result_bytes", &self.max_result_bytes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
            timeout: Some(DEFAULT_TOOL_TIMEOUT),
        }
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Validate arguments against each tool's JSON Schema before execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Per-call timeout. `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Register `tool` only when `condition` holds.
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// All tool definitions, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name, with optional validation, timing and
    /// truncation. Unknown tools produce an error string.
    pub async fn execute(&self, name: &str, arguments: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            return format!("Error: unknown tool '{name}'");
        };

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.as_ref(), arguments)
        {
            return error;
        }

        log_tool_call(name, arguments);
        let start = Instant::now();

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(arguments)).await {
                Ok(r) => r,
                Err(_) => {
                    info!("Tool {name} timed out after {:.0}s", limit.as_secs_f64());
                    format!(
                        "Error: tool '{name}' timed out after {:.0} seconds.",
                        limit.as_secs_f64()
                    )
                }
            },
            None => tool.execute(arguments).await,
        };

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            result.len()
        );
        trace!("Tool {name} result: {result}");

        truncate_result(result, self.max_result_bytes)
    }

    /// Execute several calls concurrently. Results keep the input order.
    pub async fn execute_all(&self, calls: &[(String, String)]) -> Vec<String> {
        futures::future::join_all(
            calls
                .iter()
                .map(|(name, arguments)| self.execute(name, arguments)),
        )
        .await
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── FnTool ────────────────────────────────────────────────────────

type ErasedToolHandler =
    Box<dyn Fn(String) -> Pin<Box<dyn Future<Output = String> + Send>> + Send + Sync>;

/// A closure-based tool that parses its arguments into `A` and delegates to
/// a handler. For stateless tools that don't warrant their own struct.
pub struct FnTool {
    def: ToolDef,
    handler: ErasedToolHandler,
}

impl FnTool {
    pub fn new<A, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let erased = move |raw: String| -> Pin<Box<dyn Future<Output = String> + Send>> {
            match parse_tool_args::<A>(&raw) {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(async move { e }),
            }
        };

        Self {
            def,
            handler: Box::new(erased),
        }
    }
}

impl Tool for FnTool {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        (self.handler)(arguments.to_string())
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.def.function.name)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or an error string the model can act on.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let args_value: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "Error: invalid JSON arguments for tool '{}': {e}.",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().function.parameters;
    // An invalid schema is the tool's bug, not the model's.
    let validator = jsonschema::validator_for(&schema).ok()?;

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {name}({args_preview}{})",
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes (on a char boundary), appending
/// a notice if trimmed.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = s.get(..cut).unwrap_or_default();
    format!("{head}...\n[truncated: {} bytes total]", s.len())
}

/// Parse raw JSON arguments into a typed struct, formatting the error for
/// the model on failure.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Error: invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "echo",
                "Echo the input",
                serde_json::json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            )
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let args: serde_json::Value = serde_json::from_str(arguments).unwrap_or_default();
            let result = args
                .get("text")
                .and_then(|v| v.as_str())
                .map_or_else(|| "Error: no text".to_string(), str::to_string);
            Box::pin(async move { result })
        }
    }

    struct SlowTool;

    impl Tool for SlowTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new("slow", "Never finishes in time", serde_json::json!({"type": "object"}))
        }

        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late".to_string()
            })
        }
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let set = ToolSet::new().with(SlowTool).with(EchoTool);
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["echo", "slow"]);
        assert_eq!(set.definitions()[0].function.name, "echo");
    }

    #[test]
    fn with_if_false_skips_tool() {
        let set = ToolSet::new().with_if(false, EchoTool);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn execute_known_and_unknown_tools() {
        let set = ToolSet::new().with(EchoTool);
        assert_eq!(set.execute("echo", r#"{"text": "hello"}"#).await, "hello");
        assert!(set.execute("nope", "{}").await.contains("unknown tool 'nope'"));
    }

    #[tokio::test]
    async fn validation_rejects_missing_arguments() {
        let set = ToolSet::new().with_arg_validation(true).with(EchoTool);
        let result = set.execute("echo", "{}").await;
        assert!(result.contains("argument validation failed"), "{result}");

        let result = set.execute("echo", "not json").await;
        assert!(result.contains("invalid JSON arguments"));
    }

    #[tokio::test]
    async fn timeout_produces_error_string() {
        let set = ToolSet::new()
            .with_timeout(Some(Duration::from_millis(10)))
            .with(SlowTool);
        let result = set.execute("slow", "{}").await;
        assert!(result.contains("timed out"));
    }

    #[tokio::test]
    async fn execute_all_keeps_order() {
        let set = ToolSet::new().with(EchoTool);
        let results = set
            .execute_all(&[
                ("echo".into(), r#"{"text": "a"}"#.into()),
                ("echo".into(), r#"{"text": "b"}"#.into()),
            ])
            .await;
        assert_eq!(results, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn fn_tool_parses_arguments() {
        #[derive(serde::Deserialize)]
        struct Args {
            n: u32,
        }
        let tool = FnTool::new(
            ToolDef::new("double", "Double n", serde_json::json!({"type": "object"})),
            |args: Args| async move { (args.n * 2).to_string() },
        );
        assert_eq!(tool.execute(r#"{"n": 21}"#).await, "42");
        assert!(tool.execute("{}").await.starts_with("Error: invalid tool arguments"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_result("hello".into(), 100), "hello");
        let result = truncate_result("é".repeat(10), 5);
        assert!(result.starts_with("éé..."));
        assert!(result.contains("[truncated: 20 bytes total]"));
    }
}
