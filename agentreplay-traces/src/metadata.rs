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

//! Metadata extraction for finalized traces.

use crate::boundary::is_fix_attempt;
use crate::tool_call::ToolCall;
use crate::trace::TraceMetadata;

/// Derive [`TraceMetadata`] from the ordered calls of a trace.
pub fn extract_metadata(tools: &[ToolCall]) -> TraceMetadata {
    let (Some(first), Some(last)) = (tools.first(), tools.last()) else {
        return TraceMetadata::default();
    };

    let files_modified = tools
        .iter()
        .flat_map(|t| t.files_affected.iter().cloned())
        .collect();

    let errors_encountered = tools.iter().filter_map(|t| t.error.clone()).collect();

    let decisions_recorded = tools
        .iter()
        .filter_map(|t| t.decision_text().map(str::to_string))
        .collect();

    TraceMetadata {
        start_time: first.timestamp,
        end_time: last.timestamp,
        files_modified,
        errors_encountered,
        decisions_recorded,
        causal_chain: has_causal_chain(tools),
    }
}

/// Some failed call is immediately followed by a fix attempt.
pub fn has_causal_chain(tools: &[ToolCall]) -> bool {
    tools
        .windows(2)
        .any(|pair| pair[0].is_failed() && is_fix_attempt(&pair[1], &pair[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_metadata() {
        let tools = vec![
            ToolCall::new("grep", 1_000).with_file("/src/a.rs"),
            ToolCall::new("bash", 2_000).with_error("test failed"),
            ToolCall::new("edit", 3_000).with_files(vec!["/src/a.rs", "/src/b.rs"]),
            ToolCall::new("record_decision", 4_000)
                .with_arguments(json!({ "decision": "Keep the retry loop" })),
        ];

        let metadata = extract_metadata(&tools);
        assert_eq!(metadata.start_time, 1_000);
        assert_eq!(metadata.end_time, 4_000);
        assert_eq!(metadata.duration_ms(), 3_000);
        assert_eq!(metadata.files_modified.len(), 2);
        assert!(metadata.files_modified.contains("/src/b.rs"));
        assert_eq!(metadata.errors_encountered, vec!["test failed".to_string()]);
        assert_eq!(
            metadata.decisions_recorded,
            vec!["Keep the retry loop".to_string()]
        );
        assert!(metadata.causal_chain);
    }

    #[test]
    fn test_causal_chain_requires_adjacency() {
        let separated = vec![
            ToolCall::new("bash", 0).with_error("boom"),
            ToolCall::new("read", 1),
            ToolCall::new("edit", 2),
        ];
        assert!(!has_causal_chain(&separated));

        let adjacent_validation = vec![
            ToolCall::new("bash", 0).with_error("boom"),
            ToolCall::new("bash", 1),
        ];
        assert!(has_causal_chain(&adjacent_validation));

        let no_error = vec![ToolCall::new("edit", 0), ToolCall::new("bash", 1)];
        assert!(!has_causal_chain(&no_error));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_metadata(&[]), TraceMetadata::default());
    }
}
