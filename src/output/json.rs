//! JSON output

use super::Report;
use crate::Result;
use anyhow::Context;

/// Render the report as pretty-printed JSON
pub fn render(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}
