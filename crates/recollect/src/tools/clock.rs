//! `check_datetime` tool: reports the current UTC time.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::Deserialize;

use super::core::FnTool;
use crate::api::ToolDef;

/// The tool takes no arguments.
#[derive(Deserialize, JsonSchema, Default)]
pub struct CheckDatetimeArgs {}

/// RFC 3339 rendering used for tool output.
pub fn format_datetime(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build the `check_datetime` tool.
pub fn check_datetime_tool() -> FnTool {
    FnTool::new(
        ToolDef::new(
            "check_datetime",
            "Check the current date and time (UTC).",
            crate::json_schema_for::<CheckDatetimeArgs>(),
        ),
        |_: CheckDatetimeArgs| async move { format_datetime(Utc::now()) },
    )
}
