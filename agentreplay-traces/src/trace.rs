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

//! Trace data model
//!
//! A [`Trace`] is a bounded, ordered group of tool calls representing one unit
//! of work. It is created once at finalization and never changes afterwards,
//! except for the one-time attachment of its [`CompressedTrace`] projection.

use crate::tool_call::ToolCall;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new unique ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Intent of a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    /// search → read → edit
    SearchDriven,
    /// error → fix → verify
    ErrorRecovery,
    /// New code written and tested
    FeatureImplementation,
    /// Existing code reshaped and re-tested
    Refactoring,
    /// Test runs
    Testing,
    /// Read-only investigation
    Exploration,
    /// Diagnosing a failure
    Debugging,
    /// Documentation work
    Documentation,
    /// Build and deployment
    BuildDeploy,
    /// Nothing recognizable
    #[default]
    Unknown,
}

impl TraceType {
    /// All trace types, in declaration order.
    pub fn all() -> [TraceType; 10] {
        [
            TraceType::SearchDriven,
            TraceType::ErrorRecovery,
            TraceType::FeatureImplementation,
            TraceType::Refactoring,
            TraceType::Testing,
            TraceType::Exploration,
            TraceType::Debugging,
            TraceType::Documentation,
            TraceType::BuildDeploy,
            TraceType::Unknown,
        ]
    }

    /// Convert to string representation for storage/indexing.
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceType::SearchDriven => "search_driven",
            TraceType::ErrorRecovery => "error_recovery",
            TraceType::FeatureImplementation => "feature_implementation",
            TraceType::Refactoring => "refactoring",
            TraceType::Testing => "testing",
            TraceType::Exploration => "exploration",
            TraceType::Debugging => "debugging",
            TraceType::Documentation => "documentation",
            TraceType::BuildDeploy => "build_deploy",
            TraceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TraceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        TraceType::all()
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown trace type: {s}"))
    }
}

/// Facts derived from the tool calls of a trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Timestamp of the first tool call (ms)
    pub start_time: i64,
    /// Timestamp of the last tool call (ms)
    pub end_time: i64,
    /// Unique files touched by any call
    pub files_modified: BTreeSet<String>,
    /// Error messages of failed calls, in order
    pub errors_encountered: Vec<String>,
    /// Decisions recorded by decision-logging calls, in order
    pub decisions_recorded: Vec<String>,
    /// An error was immediately followed by a fix attempt
    pub causal_chain: bool,
}

impl TraceMetadata {
    /// Time span of the trace, never negative.
    pub fn duration_ms(&self) -> i64 {
        self.end_time.saturating_sub(self.start_time).max(0)
    }
}

/// Lossy long-term projection of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedTrace {
    /// Tool names joined by an arrow
    pub pattern: String,
    pub summary: String,
    pub score: f64,
    pub tool_count: usize,
    /// end_time - start_time (ms)
    pub duration: i64,
    /// start_time (ms)
    pub timestamp: i64,
}

/// A finalized trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Unique trace identifier
    pub id: TraceId,
    /// Classified intent
    #[serde(rename = "type")]
    pub trace_type: TraceType,
    /// Tool calls in insertion order
    pub tools: Vec<ToolCall>,
    /// Importance in [0, 1]
    pub score: f64,
    /// Templated description
    pub summary: String,
    /// Derived metadata
    pub metadata: TraceMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compressed: Option<CompressedTrace>,
}

impl Trace {
    /// Create a new, uncompressed trace with a generated ID.
    pub fn new(
        trace_type: TraceType,
        tools: Vec<ToolCall>,
        score: f64,
        summary: impl Into<String>,
        metadata: TraceMetadata,
    ) -> Self {
        Self {
            id: TraceId::new(),
            trace_type,
            tools,
            score,
            summary: summary.into(),
            metadata,
            compressed: None,
        }
    }

    /// Tool names in order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.tool.as_str()).collect()
    }

    /// Number of tool calls in the trace.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Compressed projection, once produced.
    pub fn compressed(&self) -> Option<&CompressedTrace> {
        self.compressed.as_ref()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.is_some()
    }

    /// Attach the compressed projection. Returns `false` (and keeps the
    /// existing projection) if the trace was already compressed.
    pub(crate) fn attach_compressed(&mut self, compressed: CompressedTrace) -> bool {
        if self.compressed.is_some() {
            return false;
        }
        self.compressed = Some(compressed);
        true
    }
}
