// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Templated trace summaries.

use crate::tool_call::ToolCall;
use crate::trace::{TraceMetadata, TraceType};

/// Separator between tool names in chains and compressed patterns.
pub const CHAIN_SEPARATOR: &str = " → ";

/// Tool names shown before the chain is abbreviated.
const MAX_CHAIN_TOOLS: usize = 12;

/// Error messages are cut to this many characters.
const MAX_ERROR_CHARS: usize = 80;

/// All tool names joined by [`CHAIN_SEPARATOR`].
pub fn tool_chain(tools: &[ToolCall]) -> String {
    tools
        .iter()
        .map(|t| t.tool.as_str())
        .collect::<Vec<_>>()
        .join(CHAIN_SEPARATOR)
}

/// Like [`tool_chain`], abbreviated for display.
fn short_chain(tools: &[ToolCall]) -> String {
    if tools.len() <= MAX_CHAIN_TOOLS {
        return tool_chain(tools);
    }
    format!(
        "{}{}… (+{} more)",
        tool_chain(&tools[..MAX_CHAIN_TOOLS]),
        CHAIN_SEPARATOR,
        tools.len() - MAX_CHAIN_TOOLS
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn files(count: usize) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{count} files")
    }
}

/// Short description of a trace, one template per type.
pub fn summarize(trace_type: TraceType, tools: &[ToolCall], metadata: &TraceMetadata) -> String {
    let chain = short_chain(tools);
    let file_count = metadata.files_modified.len();
    let first_error = metadata
        .errors_encountered
        .first()
        .map(|e| truncate(e.trim(), MAX_ERROR_CHARS));

    match trace_type {
        TraceType::SearchDriven => {
            format!("Search-driven change to {}: {chain}", files(file_count))
        }
        TraceType::ErrorRecovery => match first_error {
            Some(error) => format!("Recovered from error \"{error}\": {chain}"),
            None => format!("Error recovery: {chain}"),
        },
        TraceType::FeatureImplementation => {
            format!("Implemented feature across {}: {chain}", files(file_count))
        }
        TraceType::Refactoring => format!("Refactored {}: {chain}", files(file_count)),
        TraceType::Testing => format!("Ran tests: {chain}"),
        TraceType::Exploration => format!("Explored codebase: {chain}"),
        TraceType::Debugging => match first_error {
            Some(error) => format!("Debugged \"{error}\": {chain}"),
            None => format!("Debugging session: {chain}"),
        },
        TraceType::Documentation => {
            format!("Updated documentation in {}: {chain}", files(file_count))
        }
        TraceType::BuildDeploy => format!("Build and deploy: {chain}"),
        TraceType::Unknown => format!("Tool sequence: {chain}"),
    }
}
