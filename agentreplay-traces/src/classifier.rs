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

//! Trace type classification
//!
//! An ordered table of tool-name patterns is tried first; a pattern matches
//! when its steps occur as a (not necessarily contiguous) subsequence of the
//! trace. The first matching entry wins. When nothing matches, a fallback
//! based on tool kinds decides.
//!
//! Default table:
//!
//! ```text
//! search → grep → read → edit        SearchDriven
//! bash(error) → edit → bash          ErrorRecovery
//! write → edit → test                FeatureImplementation
//! read → edit → edit → test          Refactoring
//! test → bash → test                 Testing
//! grep → search → read               Exploration
//! bash → build → deploy              BuildDeploy
//! ```

use crate::tool_call::{ToolCall, ToolKind};
use crate::trace::TraceType;
use serde::{Deserialize, Serialize};

/// One element of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStep {
    /// Exact tool name (compared case-insensitively)
    pub tool: String,
    /// The matching call must have failed
    #[serde(default)]
    pub requires_error: bool,
}

impl PatternStep {
    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            tool: name.into().trim().to_lowercase(),
            requires_error: false,
        }
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            requires_error: true,
            ..Self::tool(name)
        }
    }

    fn matches(&self, call: &ToolCall) -> bool {
        call.normalized_name() == self.tool && (!self.requires_error || call.is_failed())
    }
}

/// A pattern and the type it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracePattern {
    pub steps: Vec<PatternStep>,
    pub trace_type: TraceType,
}

impl TracePattern {
    pub fn new(trace_type: TraceType, steps: Vec<PatternStep>) -> Self {
        Self { steps, trace_type }
    }

    /// Pattern made only of plain tool names.
    pub fn of_tools(trace_type: TraceType, tools: &[&str]) -> Self {
        Self::new(trace_type, tools.iter().map(|t| PatternStep::tool(*t)).collect())
    }

    /// Steps occur in order, scanning left to right.
    pub fn matches(&self, tools: &[ToolCall]) -> bool {
        let mut steps = self.steps.iter().peekable();
        for call in tools {
            match steps.peek() {
                Some(step) if step.matches(call) => {
                    steps.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        steps.peek().is_none()
    }
}

/// The built-in pattern table, in priority order.
pub fn default_patterns() -> Vec<TracePattern> {
    vec![
        TracePattern::of_tools(TraceType::SearchDriven, &["search", "grep", "read", "edit"]),
        TracePattern::new(
            TraceType::ErrorRecovery,
            vec![
                PatternStep::failed("bash"),
                PatternStep::tool("edit"),
                PatternStep::tool("bash"),
            ],
        ),
        TracePattern::of_tools(TraceType::FeatureImplementation, &["write", "edit", "test"]),
        TracePattern::of_tools(TraceType::Refactoring, &["read", "edit", "edit", "test"]),
        TracePattern::of_tools(TraceType::Testing, &["test", "bash", "test"]),
        TracePattern::of_tools(TraceType::Exploration, &["grep", "search", "read"]),
        TracePattern::of_tools(TraceType::BuildDeploy, &["bash", "build", "deploy"]),
    ]
}

/// Maps tool sequences to [`TraceType`]s.
#[derive(Debug, Clone)]
pub struct TraceClassifier {
    patterns: Vec<TracePattern>,
}

impl Default for TraceClassifier {
    fn default() -> Self {
        Self::new(default_patterns())
    }
}

impl TraceClassifier {
    /// Classifier with a custom pattern table (tried in order).
    pub fn new(patterns: Vec<TracePattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[TracePattern] {
        &self.patterns
    }

    pub fn classify(&self, tools: &[ToolCall]) -> TraceType {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(tools))
            .map(|pattern| pattern.trace_type)
            .unwrap_or_else(|| classify_by_kind(tools))
    }
}

/// Fallback when no pattern matches.
pub fn classify_by_kind(tools: &[ToolCall]) -> TraceType {
    let has = |kind: ToolKind| tools.iter().any(|t| t.kind() == kind);

    let has_search = has(ToolKind::Search);
    let has_edit = has(ToolKind::Edit);

    if has_search && has_edit {
        TraceType::SearchDriven
    } else if has_search {
        TraceType::Exploration
    } else if tools.iter().any(ToolCall::is_failed) {
        TraceType::ErrorRecovery
    } else if has(ToolKind::Test) {
        TraceType::Testing
    } else if has(ToolKind::Write) {
        TraceType::FeatureImplementation
    } else {
        TraceType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls(names: &[&str]) -> Vec<ToolCall> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall::new(*name, i as i64))
            .collect()
    }

    #[test]
    fn test_search_driven_pattern() {
        let classifier = TraceClassifier::default();
        assert_eq!(
            classifier.classify(&calls(&["search", "grep", "read", "edit"])),
            TraceType::SearchDriven
        );
    }

    #[test]
    fn test_subsequence_not_contiguous() {
        let classifier = TraceClassifier::default();
        assert_eq!(
            classifier.classify(&calls(&["write", "read", "edit", "bash", "test"])),
            TraceType::FeatureImplementation
        );
    }

    #[test]
    fn test_error_recovery_requires_failed_bash() {
        let classifier = TraceClassifier::default();
        let mut tools = calls(&["bash", "edit", "bash"]);
        tools[0].error = Some("exit 1".to_string());
        assert_eq!(classifier.classify(&tools), TraceType::ErrorRecovery);

        // Without the error the same names are not error recovery.
        assert_ne!(
            classifier.classify(&calls(&["bash", "edit", "bash"])),
            TraceType::ErrorRecovery
        );
    }

    #[test]
    fn test_table_order_wins() {
        let classifier = TraceClassifier::default();
        // Matches both SearchDriven and Exploration; SearchDriven is listed first.
        let tools = calls(&["grep", "search", "grep", "read", "edit"]);
        assert_eq!(classifier.classify(&tools), TraceType::SearchDriven);

        let tools = calls(&["bash", "build", "deploy"]);
        assert_eq!(classifier.classify(&tools), TraceType::BuildDeploy);
    }

    #[test]
    fn test_repeated_step_needs_two_calls() {
        let classifier = TraceClassifier::default();
        assert_eq!(
            classifier.classify(&calls(&["read", "edit", "edit", "test"])),
            TraceType::Refactoring
        );
        // A single edit cannot satisfy `edit → edit`.
        assert_eq!(
            classifier.classify(&calls(&["read", "edit", "test"])),
            TraceType::Testing
        );
    }

    #[test]
    fn test_fallback_order() {
        assert_eq!(
            classify_by_kind(&calls(&["glob", "str_replace"])),
            TraceType::SearchDriven
        );
        assert_eq!(classify_by_kind(&calls(&["glob", "read"])), TraceType::Exploration);

        let mut failed = calls(&["bash"]);
        failed[0].error = Some("boom".to_string());
        assert_eq!(classify_by_kind(&failed), TraceType::ErrorRecovery);

        assert_eq!(classify_by_kind(&calls(&["pytest"])), TraceType::Testing);
        assert_eq!(
            classify_by_kind(&calls(&["create_file"])),
            TraceType::FeatureImplementation
        );
        assert_eq!(classify_by_kind(&calls(&["read", "bash"])), TraceType::Unknown);
        assert_eq!(classify_by_kind(&[]), TraceType::Unknown);
    }

    #[test]
    fn test_custom_patterns() {
        let classifier = TraceClassifier::new(vec![TracePattern::of_tools(
            TraceType::Documentation,
            &["read", "write_docs"],
        )]);
        assert_eq!(
            classifier.classify(&calls(&["read", "Write_Docs"])),
            TraceType::Documentation
        );
    }
}
