//! Rendering of parse reports for the `argguard` binary.

use crate::command::CommandResult;
use crate::config::Values;
use anyhow::Result;
use serde::{Serialize, Serializer};

/// Everything a successful run produced.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Values bound by the top-level parser.
    pub values: Values,
    /// Result of the selected command, if any. Serialized together with the
    /// command's name, apart from `values`, so no argument name can clash.
    #[serde(
        serialize_with = "serialize_named",
        skip_serializing_if = "Option::is_none"
    )]
    pub command: Option<CommandResult>,
}

#[derive(Serialize)]
struct NamedResult<'a> {
    name: &'a str,
    #[serde(flatten)]
    result: &'a CommandResult,
}

fn serialize_named<S: Serializer>(
    command: &Option<CommandResult>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    command
        .as_ref()
        .map(|result| NamedResult {
            name: result.name(),
            result,
        })
        .serialize(serializer)
}

/// Render a report as pretty-printed JSON with a trailing newline.
pub fn render_json(report: &Report) -> Result<String> {
    let mut out = serde_json::to_string_pretty(report)?;
    out.push('\n');
    Ok(out)
}

/// Render a command result as text: the payload, then one line per error.
pub fn render_result_text(result: &CommandResult) -> String {
    let mut out = String::new();
    if let Some(payload) = result.payload() {
        out.push_str(&payload.to_string());
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
    }
    for message in result.error_messages() {
        out.push_str(&format!("error: {}\n", message));
    }
    out
}

/// Render a report as `name=value` lines followed by the command result.
pub fn render_text(report: &Report) -> String {
    let mut out = report.values.to_string();
    if let Some(ref result) = report.command {
        out.push_str(&format!("[{}]\n", result.name()));
        out.push_str(&render_result_text(result));
    }
    out
}
