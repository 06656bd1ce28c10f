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

//! Tool call events
//!
//! A [`ToolCall`] is one capability invocation made by the coding agent
//! (search, file edit, test run, shell command, ...). Tool names come from an
//! open set: any string is accepted, and [`ToolKind`] derives a coarse family
//! from it for the heuristics that need one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Argument key carrying the decision text of decision-logging tools.
pub const DECISION_ARGUMENT: &str = "decision";

/// Unique identifier for a tool call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallId(pub String);

impl ToolCallId {
    /// Generate a new unique ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for ToolCallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tool Kinds
// ============================================================================

/// Coarse family of a tool, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Codebase search (grep, glob, semantic search)
    Search,
    /// Read a file
    Read,
    /// Edit an existing file
    Edit,
    /// Write/create a file
    Write,
    /// Run tests
    Test,
    /// Shell/terminal execution
    Shell,
    /// Build/compile
    Build,
    /// Deploy/release
    Deploy,
    /// Record a decision
    Decision,
    /// Documentation work
    Documentation,
    /// Anything else
    Other,
}

impl ToolKind {
    /// Classify a tool name (common spellings from various agents).
    pub fn classify(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        match lower.as_str() {
            "search"
            | "grep"
            | "glob"
            | "find"
            | "codebase_search"
            | "grep_search"
            | "semantic_search"
            | "file_search"
            | "ripgrep" => ToolKind::Search,
            "read" | "read_file" | "readfile" | "view" | "cat" | "open" => ToolKind::Read,
            "edit"
            | "edit_file"
            | "editfile"
            | "multiedit"
            | "multi_edit"
            | "str_replace"
            | "str_replace_editor"
            | "patch"
            | "apply_patch" => ToolKind::Edit,
            "write" | "write_file" | "writefile" | "create" | "create_file" | "new_file" => {
                ToolKind::Write
            }
            "test" | "run_tests" | "pytest" | "jest" | "cargo_test" | "npm_test" => ToolKind::Test,
            "bash"
            | "shell"
            | "terminal"
            | "exec"
            | "execute"
            | "run_terminal_command"
            | "command" => ToolKind::Shell,
            "build" | "compile" | "make" | "cargo_build" => ToolKind::Build,
            "deploy" | "release" | "publish" => ToolKind::Deploy,
            "decision" | "record_decision" | "log_decision" | "decide" => ToolKind::Decision,
            "document" | "docs" | "write_docs" | "update_docs" => ToolKind::Documentation,
            other => Self::classify_fuzzy(other),
        }
    }

    /// Fallback for unlisted names. Matches whole words only, so
    /// `run_unit_tests` is a test and `latest_release` is not.
    fn classify_fuzzy(lower: &str) -> Self {
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let has = |candidates: &[&str]| words.iter().any(|word| candidates.contains(word));

        if has(&["decision", "decisions", "decide"]) {
            ToolKind::Decision
        } else if has(&["test", "tests", "pytest", "jest", "rspec"]) {
            ToolKind::Test
        } else if has(&["search", "grep", "glob", "find", "ripgrep"]) {
            ToolKind::Search
        } else if has(&["edit", "replace", "patch", "multiedit"]) {
            ToolKind::Edit
        } else if has(&["write", "create", "new"]) {
            ToolKind::Write
        } else if has(&["read", "view", "cat", "open"]) {
            ToolKind::Read
        } else if has(&["build", "compile", "make"]) {
            ToolKind::Build
        } else if has(&["deploy", "release", "publish"]) {
            ToolKind::Deploy
        } else if has(&["doc", "docs", "document", "documentation", "readme"]) {
            ToolKind::Documentation
        } else if has(&["bash", "shell", "exec", "execute", "terminal", "command"]) {
            ToolKind::Shell
        } else {
            ToolKind::Other
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Search => "search",
            ToolKind::Read => "read",
            ToolKind::Edit => "edit",
            ToolKind::Write => "write",
            ToolKind::Test => "test",
            ToolKind::Shell => "shell",
            ToolKind::Build => "build",
            ToolKind::Deploy => "deploy",
            ToolKind::Decision => "decision",
            ToolKind::Documentation => "documentation",
            ToolKind::Other => "other",
        }
    }

    /// Edit or write operation
    pub fn is_modification(&self) -> bool {
        matches!(self, ToolKind::Edit | ToolKind::Write)
    }

    /// Test run or shell execution, used as validation of earlier work
    pub fn is_execution(&self) -> bool {
        matches!(self, ToolKind::Test | ToolKind::Shell)
    }

    /// Leaves a lasting change behind (file modification or recorded decision)
    pub fn is_permanent(&self) -> bool {
        matches!(self, ToolKind::Edit | ToolKind::Write | ToolKind::Decision)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tool Call
// ============================================================================

/// A single tool invocation observed from the coding agent.
///
/// Tool calls are immutable once handed to the detector; the builder methods
/// below are meant for the caller constructing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier (generated when the caller omits it)
    #[serde(default)]
    pub id: ToolCallId,

    /// Name of the invoked tool
    pub tool: String,

    /// Opaque tool arguments
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub arguments: serde_json::Value,

    /// Timestamp in milliseconds
    pub timestamp: i64,

    /// Tool output, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error message; presence marks the call as failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Files touched by the call, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_affected: Vec<String>,

    /// Elapsed time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCall {
    /// Create a new tool call with a generated ID
    pub fn new(tool: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: ToolCallId::new(),
            tool: tool.into(),
            arguments: serde_json::Value::Null,
            timestamp,
            result: None,
            error: None,
            files_affected: Vec::new(),
            duration_ms: None,
        }
    }

    /// Use a caller-supplied ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = ToolCallId::from_string(id);
        self
    }

    /// Set the arguments
    pub fn with_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set the result
    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Mark the call as failed
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Add an affected file
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.files_affected.push(path.into());
        self
    }

    /// Set all affected files
    pub fn with_files(mut self, files: Vec<impl Into<String>>) -> Self {
        self.files_affected = files.into_iter().map(Into::into).collect();
        self
    }

    /// Set duration
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Tool family derived from the name
    pub fn kind(&self) -> ToolKind {
        ToolKind::classify(&self.tool)
    }

    /// Lowercased tool name, used for exact pattern comparisons
    pub fn normalized_name(&self) -> String {
        self.tool.trim().to_lowercase()
    }

    /// Whether the call failed
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Decision text, for decision-logging tools that carry one
    pub fn decision_text(&self) -> Option<&str> {
        if self.kind() != ToolKind::Decision {
            return None;
        }
        self.arguments
            .get(DECISION_ARGUMENT)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_kind_classify() {
        assert_eq!(ToolKind::classify("grep"), ToolKind::Search);
        assert_eq!(ToolKind::classify("Read_File"), ToolKind::Read);
        assert_eq!(ToolKind::classify("str_replace_editor"), ToolKind::Edit);
        assert_eq!(ToolKind::classify("write"), ToolKind::Write);
        assert_eq!(ToolKind::classify("bash"), ToolKind::Shell);
        assert_eq!(ToolKind::classify("run_unit_tests"), ToolKind::Test);
        assert_eq!(ToolKind::classify("record_decision"), ToolKind::Decision);
        assert_eq!(ToolKind::classify("mcp__weather__forecast"), ToolKind::Other);
    }

    #[test]
    fn test_fuzzy_kind_matches_whole_words() {
        assert_eq!(ToolKind::classify("latest_release"), ToolKind::Deploy);
        assert_eq!(ToolKind::classify("attest_build"), ToolKind::Build);
        assert_eq!(ToolKind::classify("contest_entry"), ToolKind::Other);
        assert_eq!(ToolKind::classify("run_unit_tests"), ToolKind::Test);
        assert_eq!(ToolKind::classify("mcp__github__create_file"), ToolKind::Write);
        assert_eq!(ToolKind::classify("already_read"), ToolKind::Read);
        assert_eq!(ToolKind::classify("spreadsheet_view"), ToolKind::Read);
        assert_eq!(ToolKind::classify("Search-Docs"), ToolKind::Search);
    }

    #[test]
    fn test_kind_groups() {
        assert!(ToolKind::Edit.is_modification());
        assert!(ToolKind::Write.is_modification());
        assert!(!ToolKind::Read.is_modification());
        assert!(ToolKind::Shell.is_execution());
        assert!(ToolKind::Test.is_execution());
        assert!(ToolKind::Decision.is_permanent());
        assert!(!ToolKind::Search.is_permanent());
    }

    #[test]
    fn test_builder() {
        let call = ToolCall::new("edit", 1_000)
            .with_id("call-1")
            .with_file("src/main.rs")
            .with_duration(25)
            .with_error("compile failed");

        assert_eq!(call.id.0, "call-1");
        assert_eq!(call.files_affected, vec!["src/main.rs".to_string()]);
        assert_eq!(call.duration_ms, Some(25));
        assert!(call.is_failed());
    }

    #[test]
    fn test_decision_text() {
        let call = ToolCall::new("record_decision", 0)
            .with_arguments(json!({ "decision": "  Use SQLite for the cache " }));
        assert_eq!(call.decision_text(), Some("Use SQLite for the cache"));

        let not_decision =
            ToolCall::new("edit", 0).with_arguments(json!({ "decision": "ignored" }));
        assert_eq!(not_decision.decision_text(), None);

        let empty =
            ToolCall::new("decision", 0).with_arguments(json!({ "decision": "" }));
        assert_eq!(empty.decision_text(), None);
    }

    #[test]
    fn test_deserialize_generates_missing_id() {
        let call: ToolCall =
            serde_json::from_str(r#"{"tool":"grep","timestamp":42}"#).unwrap();
        assert_eq!(call.tool, "grep");
        assert_eq!(call.timestamp, 42);
        assert!(!call.id.0.is_empty());
        assert!(call.arguments.is_null());
        assert!(call.files_affected.is_empty());
    }
}
